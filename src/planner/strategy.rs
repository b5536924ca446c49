//! Cut-mode selection against the source's keyframe layout

use tracing::debug;

use crate::domain::model::{CutDecision, CutMode, SegmentPlanEntry};
use crate::planner::KeyframeIndex;

/// Snap-or-fallback policy for stream-copy cuts
#[derive(Debug, Clone, Copy)]
pub struct CutPolicy {
    /// Largest backward snap accepted before falling back to re-encode
    tolerance: f64,
}

impl CutPolicy {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Decide how to cut `entry`.
    ///
    /// A requested re-encode is kept as is. For stream copy the start snaps
    /// back to the nearest preceding keyframe when that keyframe lies within
    /// the tolerance; otherwise the entry is re-encoded from its exact start.
    /// Sources without keyframe information are copied unsnapped.
    /// An entry with no keyframe at or before its start is re-encoded.
    pub fn decide(
        &self,
        entry: &SegmentPlanEntry,
        keyframes: &KeyframeIndex,
        requested: CutMode,
    ) -> CutDecision {
        let exact = |mode| CutDecision {
            mode,
            start: entry.start,
            drift: 0.0,
        };

        if requested == CutMode::ReEncode {
            return exact(CutMode::ReEncode);
        }
        if entry.start <= 0.0 || keyframes.is_empty() {
            return exact(CutMode::StreamCopy);
        }

        let Some(anchor) = keyframes.preceding(entry.start) else {
            debug!(
                "Segment {} starts before the first keyframe, re-encoding",
                entry.index
            );
            return exact(CutMode::ReEncode);
        };
        let drift = (entry.start - anchor).max(0.0);

        if drift <= self.tolerance {
            debug!(
                "Segment {} snaps to keyframe {:.3}s (drift {:.3}s)",
                entry.index, anchor, drift
            );
            CutDecision {
                mode: CutMode::StreamCopy,
                start: anchor,
                drift,
            }
        } else {
            debug!(
                "Segment {} is {:.3}s from keyframe {:.3}s, re-encoding",
                entry.index, drift, anchor
            );
            exact(CutMode::ReEncode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, start: f64, end: f64) -> SegmentPlanEntry {
        SegmentPlanEntry::new(index, start, end)
    }

    #[test]
    fn test_within_tolerance_snaps_back() {
        let policy = CutPolicy::new(1.0);
        let keyframes = KeyframeIndex::new(vec![0.0, 29.5, 59.0]);
        let decision = policy.decide(&entry(1, 30.0, 60.0), &keyframes, CutMode::StreamCopy);
        assert_eq!(decision.mode, CutMode::StreamCopy);
        assert_eq!(decision.start, 29.5);
        assert!((decision.drift - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_beyond_tolerance_falls_back() {
        let policy = CutPolicy::new(1.0);
        let keyframes = KeyframeIndex::new(vec![0.0, 25.0, 50.0]);
        let decision = policy.decide(&entry(1, 30.0, 60.0), &keyframes, CutMode::StreamCopy);
        assert_eq!(decision.mode, CutMode::ReEncode);
        assert_eq!(decision.start, 30.0);
        assert_eq!(decision.drift, 0.0);
    }

    #[test]
    fn test_exact_keyframe_has_no_drift() {
        let policy = CutPolicy::new(0.0);
        let keyframes = KeyframeIndex::new(vec![0.0, 30.0]);
        let decision = policy.decide(&entry(1, 30.0, 60.0), &keyframes, CutMode::StreamCopy);
        assert_eq!(decision.mode, CutMode::StreamCopy);
        assert_eq!(decision.drift, 0.0);
    }

    #[test]
    fn test_first_entry_and_missing_keyframes_copy() {
        let policy = CutPolicy::new(0.5);
        let sparse = KeyframeIndex::new(vec![10.0]);
        assert_eq!(
            policy.decide(&entry(0, 0.0, 30.0), &sparse, CutMode::StreamCopy).mode,
            CutMode::StreamCopy
        );
        let none = KeyframeIndex::default();
        assert_eq!(
            policy.decide(&entry(2, 60.0, 90.0), &none, CutMode::StreamCopy).mode,
            CutMode::StreamCopy
        );
    }

    #[test]
    fn test_start_before_first_keyframe_reencodes() {
        let policy = CutPolicy::new(1.0);
        let late = KeyframeIndex::new(vec![30.5, 60.0]);
        let decision = policy.decide(&entry(1, 30.0, 60.0), &late, CutMode::StreamCopy);
        assert_eq!(decision.mode, CutMode::ReEncode);
        assert_eq!(decision.start, 30.0);
        assert_eq!(decision.drift, 0.0);
    }

    #[test]
    fn test_requested_reencode_is_kept() {
        let policy = CutPolicy::new(5.0);
        let keyframes = KeyframeIndex::new(vec![0.0, 30.0]);
        let decision = policy.decide(&entry(1, 30.0, 60.0), &keyframes, CutMode::ReEncode);
        assert_eq!(decision.mode, CutMode::ReEncode);
    }
}
