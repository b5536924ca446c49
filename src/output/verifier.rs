//! Output verification for produced segments

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SplitError, SplitResult};
use crate::probe::MediaProber;

/// Rejects missing, empty or truncated segment files
#[derive(Clone)]
pub struct SegmentVerifier {
    prober: Option<MediaProber>,
    slack: f64,
}

impl SegmentVerifier {
    /// Only existence and size are checked.
    pub fn size_only() -> Self {
        Self {
            prober: None,
            slack: 0.0,
        }
    }

    /// Also probe the output and require at least `expected - slack` seconds.
    pub fn with_duration_check(prober: MediaProber, slack: f64) -> Self {
        Self {
            prober: Some(prober),
            slack: slack.max(0.0),
        }
    }

    /// Verify the clip for segment `index`, returning its size in bytes.
    pub async fn verify(
        &self,
        index: usize,
        path: &Path,
        expected_duration: f64,
        cancel: &CancellationToken,
    ) -> SplitResult<u64> {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(cut_error(index, format!("{} is not a file", path.display()))),
            Err(_) => return Err(cut_error(index, "tool produced no output file".to_string())),
        };
        if size == 0 {
            return Err(cut_error(index, "tool produced a zero-byte file".to_string()));
        }

        if let Some(prober) = &self.prober {
            let actual = prober.duration(path, cancel).await.map_err(|e| match e {
                SplitError::Cancelled => SplitError::Cancelled,
                other => cut_error(index, format!("output unreadable: {other}")),
            })?;
            if actual + self.slack < expected_duration {
                return Err(cut_error(
                    index,
                    format!(
                        "output truncated: {:.3}s of expected {:.3}s",
                        actual, expected_duration
                    ),
                ));
            }
            debug!("Segment {} verified at {:.3}s", index, actual);
        }

        Ok(size)
    }
}

fn cut_error(index: usize, message: String) -> SplitError {
    SplitError::Cut { index, message }
}
