//! Error handling module for SplitX

use std::time::Duration;

use thiserror::Error;

/// Main error type for SplitX operations
#[derive(Error, Debug)]
pub enum SplitError {
    /// Bad user input; the caller re-prompts without changing state
    #[error("{0}")]
    Validation(String),

    /// Non-positive or non-finite duration handed to the planner
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Media inspection failed
    #[error("Failed to probe {path}: {message}")]
    Probe { path: String, message: String },

    /// A segment could not be produced
    #[error("Cutting segment {index} failed: {message}")]
    Cut { index: usize, message: String },

    /// Temporary directory could not be created or used
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Delivery to the user failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An external tool ran past its deadline and was killed
    #[error("{tool} timed out after {}s", after.as_secs())]
    Timeout { tool: String, after: Duration },

    /// An external tool could not be spawned or exited non-zero
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// The job was cancelled by the user or by session eviction
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SplitError {
    /// Whether a failed cut should be attempted once more in re-encode mode.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SplitError::Cut { .. } | SplitError::Tool { .. } | SplitError::Timeout { .. }
        )
    }

    /// Whether this error ends a job as cancelled rather than failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SplitError::Cancelled)
    }

    /// Attach a segment index to a tool-level failure.
    pub fn into_cut(self, index: usize) -> SplitError {
        match self {
            SplitError::Cancelled => SplitError::Cancelled,
            SplitError::Cut { .. } => self,
            other => SplitError::Cut {
                index,
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for SplitX operations
pub type SplitResult<T> = std::result::Result<T, SplitError>;
