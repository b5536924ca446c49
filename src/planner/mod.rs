//! Segment planning and cut-mode selection

pub mod keyframe_analyzer;
pub mod strategy;

use tracing::debug;

use crate::domain::model::{PlanOutcome, SegmentPlan, SegmentPlanEntry};
use crate::error::{SplitError, SplitResult};

pub use keyframe_analyzer::KeyframeIndex;
pub use strategy::CutPolicy;

/// Compute contiguous cut points covering `[0, duration)`.
///
/// Entry `i` spans `[i * length, min((i + 1) * length, duration))`; the last
/// entry always ends exactly at `duration`. When `length >= duration` the
/// result is [`PlanOutcome::WholeFile`].
pub fn plan(duration: f64, segment_length: f64) -> SplitResult<PlanOutcome> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SplitError::InvalidDuration(format!(
            "source duration must be positive, got {}",
            duration
        )));
    }
    if !segment_length.is_finite() || segment_length <= 0.0 {
        return Err(SplitError::InvalidDuration(format!(
            "segment length must be positive, got {}",
            segment_length
        )));
    }

    let whole = || PlanOutcome::WholeFile {
        entry: SegmentPlanEntry::new(0, 0.0, duration),
    };

    if segment_length >= duration {
        debug!("Segment length {} covers duration {}", segment_length, duration);
        return Ok(whole());
    }

    let mut count = (duration / segment_length).ceil() as usize;
    // Rounding in the quotient must not leave an entry starting at `duration`
    while count > 1 && (count - 1) as f64 * segment_length >= duration {
        count -= 1;
    }
    if count < 2 {
        return Ok(whole());
    }

    let entries = (0..count)
        .map(|i| {
            let start = i as f64 * segment_length;
            let end = if i + 1 == count {
                duration
            } else {
                (i + 1) as f64 * segment_length
            };
            SegmentPlanEntry::new(i, start, end)
        })
        .collect::<Vec<_>>();

    debug!(
        "Planned {} segments of {}s over {:.3}s",
        entries.len(),
        segment_length,
        duration
    );

    Ok(PlanOutcome::Split {
        plan: SegmentPlan::new(entries, segment_length, duration),
    })
}
