//! Sorted keyframe timestamps with nearest-preceding lookup

use serde::Serialize;

/// Slack applied when comparing a cut start against keyframe timestamps.
const TIMESTAMP_EPSILON: f64 = 1e-6;

/// Ascending, de-duplicated keyframe timestamps of one source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyframeIndex {
    timestamps: Vec<f64>,
}

impl KeyframeIndex {
    /// Build an index, discarding negative and non-finite values.
    pub fn new(mut timestamps: Vec<f64>) -> Self {
        timestamps.retain(|t| t.is_finite() && *t >= 0.0);
        timestamps.sort_by(f64::total_cmp);
        timestamps.dedup_by(|a, b| (*a - *b).abs() < TIMESTAMP_EPSILON);
        Self { timestamps }
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Latest keyframe at or before `at`.
    pub fn preceding(&self, at: f64) -> Option<f64> {
        let pos = self
            .timestamps
            .partition_point(|k| *k <= at + TIMESTAMP_EPSILON);
        pos.checked_sub(1).map(|i| self.timestamps[i])
    }

    /// Mean distance between consecutive keyframes.
    pub fn average_interval(&self) -> Option<f64> {
        if self.timestamps.len() < 2 {
            return None;
        }
        let span = self.timestamps[self.timestamps.len() - 1] - self.timestamps[0];
        Some(span / (self.timestamps.len() - 1) as f64)
    }
}
