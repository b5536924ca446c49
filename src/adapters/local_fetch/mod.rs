//! Fetch adapter for files already reachable on the local filesystem

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::model::FileRef;
use crate::error::{SplitError, SplitResult};
use crate::ports::FetchPort;
use crate::utils::Utils;

/// Copies a local file into the job workspace
#[derive(Debug, Clone)]
pub struct LocalFetch {
    max_bytes: u64,
}

impl LocalFetch {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl FetchPort for LocalFetch {
    async fn fetch(&self, file: &FileRef, dest: &Path) -> SplitResult<u64> {
        let meta = tokio::fs::metadata(&file.location).await.map_err(|e| {
            SplitError::Transport(format!("cannot read {}: {e}", file.location.display()))
        })?;
        if !meta.is_file() {
            return Err(SplitError::Transport(format!(
                "{} is not a regular file",
                file.location.display()
            )));
        }
        if meta.len() > self.max_bytes {
            return Err(SplitError::Transport(format!(
                "file is {} but the limit is {}",
                Utils::format_file_size(meta.len()),
                Utils::format_file_size(self.max_bytes)
            )));
        }

        let copied = tokio::fs::copy(&file.location, dest).await.map_err(|e| {
            SplitError::Transport(format!("copying {} failed: {e}", file.location.display()))
        })?;
        debug!("Fetched {} bytes into {}", copied, dest.display());
        Ok(copied)
    }
}
