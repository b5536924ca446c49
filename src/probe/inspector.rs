//! Media Prober: source inspection through the probe port

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::model::ProbeReport;
use crate::error::{SplitError, SplitResult};
use crate::ports::ProbePort;
use crate::probe::MediaValidator;

/// Extracts duration, codec and keyframe layout of a source file
#[derive(Clone)]
pub struct MediaProber {
    port: Arc<dyn ProbePort>,
}

impl MediaProber {
    pub fn new(port: Arc<dyn ProbePort>) -> Self {
        Self { port }
    }

    /// Probe and validate a source.
    ///
    /// Fails with [`SplitError::Probe`] when the file is missing, the tool
    /// exits non-zero, output cannot be parsed, or the duration is zero or
    /// unreadable.
    pub async fn probe(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<ProbeReport> {
        if !path.is_file() {
            return Err(SplitError::Probe {
                path: path.display().to_string(),
                message: "file not found".to_string(),
            });
        }

        let raw = self.port.probe(path, cancel).await?;
        let report = MediaValidator::validate(path, raw)?;

        info!(
            "Probed {}: {:.3}s, codec {}, {} keyframes",
            path.display(),
            report.duration,
            report.codec,
            report.keyframes.len()
        );
        Ok(report)
    }

    /// Container duration of a produced file.
    pub async fn duration(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<f64> {
        self.port.probe_duration(path, cancel).await
    }
}
