//! Directory transport: delivered files are copied into a per-user folder
//! before the inner transport announces them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::model::UserId;
use crate::error::{SplitError, SplitResult};
use crate::ports::TransportPort;

/// Persists files outside the job workspace, then delegates to `inner`
pub struct DirectoryTransport<T> {
    out_dir: PathBuf,
    per_user: bool,
    inner: T,
}

impl<T: TransportPort> DirectoryTransport<T> {
    pub fn new(out_dir: impl Into<PathBuf>, inner: T) -> Self {
        Self {
            out_dir: out_dir.into(),
            per_user: true,
            inner,
        }
    }

    /// Write straight into `out_dir` instead of `out_dir/<user>`.
    pub fn flat(mut self) -> Self {
        self.per_user = false;
        self
    }

    fn target_dir(&self, user: &UserId) -> PathBuf {
        if self.per_user {
            self.out_dir.join(user.as_str())
        } else {
            self.out_dir.clone()
        }
    }
}

/// Copy through a temp file in the target directory so readers never see a
/// half-written clip.
fn persist_copy(src: &Path, dir: &Path) -> SplitResult<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| SplitError::Transport(format!("{} has no file name", src.display())))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| SplitError::Transport(format!("cannot create {}: {e}", dir.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| SplitError::Transport(format!("temp file in {}: {e}", dir.display())))?;
    let mut input = std::fs::File::open(src)
        .map_err(|e| SplitError::Transport(format!("cannot open {}: {e}", src.display())))?;
    std::io::copy(&mut input, tmp.as_file_mut())
        .map_err(|e| SplitError::Transport(format!("copy failed: {e}")))?;

    let dest = dir.join(name);
    tmp.persist(&dest).map_err(|e| {
        SplitError::Transport(format!("cannot persist {}: {}", dest.display(), e.error))
    })?;
    Ok(dest)
}

#[async_trait]
impl<T: TransportPort> TransportPort for DirectoryTransport<T> {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn send_text(&self, user: &UserId, text: &str) -> SplitResult<()> {
        self.inner.send_text(user, text).await
    }

    async fn send_file(&self, user: &UserId, path: &Path, caption: &str) -> SplitResult<()> {
        let src = path.to_path_buf();
        let dir = self.target_dir(user);
        let dest = tokio::task::spawn_blocking(move || persist_copy(&src, &dir))
            .await
            .map_err(|e| SplitError::Transport(format!("copy task failed: {e}")))??;
        debug!("Delivered {} to {}", path.display(), dest.display());
        self.inner.send_file(user, &dest, caption).await
    }
}
