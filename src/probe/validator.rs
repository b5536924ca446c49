//! Probe report validation

use std::path::Path;

use crate::domain::model::ProbeReport;
use crate::error::{SplitError, SplitResult};
use crate::planner::KeyframeIndex;

/// Checks and normalises what the probe tool reported
pub struct MediaValidator;

impl MediaValidator {
    /// Reject unusable durations and normalise the keyframe list to
    /// ascending, de-duplicated, non-negative timestamps.
    pub fn validate(path: &Path, mut report: ProbeReport) -> SplitResult<ProbeReport> {
        if !report.duration.is_finite() || report.duration <= 0.0 {
            return Err(SplitError::Probe {
                path: path.display().to_string(),
                message: format!("invalid or zero duration ({})", report.duration),
            });
        }

        let index = KeyframeIndex::new(std::mem::take(&mut report.keyframes));
        report.keyframes = index
            .timestamps()
            .iter()
            .copied()
            .filter(|t| *t <= report.duration)
            .collect();
        Ok(report)
    }
}
