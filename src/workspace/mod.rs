//! Workspace Manager: one temporary directory per job
//!
//! Layout is `<temp_root>/<job_id>/`. A [`Workspace`] removes its directory
//! exactly once, either through [`WorkspaceManager::release`] or on drop.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::model::JobId;
use crate::error::{SplitError, SplitResult};

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Allocates and reclaims job workspaces under one root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    counters: Arc<Counters>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty directory for `job_id`.
    pub fn acquire(&self, job_id: JobId) -> SplitResult<Workspace> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            SplitError::Workspace(format!("cannot create {}: {e}", self.root.display()))
        })?;

        let path = self.root.join(job_id.to_string());
        std::fs::create_dir(&path).map_err(|e| {
            SplitError::Workspace(format!("cannot create {}: {e}", path.display()))
        })?;

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        debug!("Acquired workspace {}", path.display());

        Ok(Workspace {
            job_id,
            path,
            released: AtomicBool::new(false),
            counters: Arc::clone(&self.counters),
        })
    }

    /// Remove the workspace and everything in it. Idempotent; never fails.
    pub fn release(&self, workspace: &Workspace) {
        workspace.release();
    }

    /// Workspaces acquired since startup.
    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Workspaces actually removed since startup.
    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Remove job directories left behind by an earlier process.
    pub fn purge_stale(&self) -> usize {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot scan {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut purged = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let is_job_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && JobId::parse(&name.to_string_lossy()).is_some();
            if is_job_dir {
                remove_tree(&entry.path());
                purged += 1;
            }
        }
        if purged > 0 {
            info!("Purged {} stale workspaces from {}", purged, self.root.display());
        }
        purged
    }
}

/// Directory owned by one job
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    path: PathBuf,
    released: AtomicBool,
    counters: Arc<Counters>,
}

impl Workspace {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Returns `true` for the call that performed the removal.
    fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        remove_tree(&self.path);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        debug!("Released workspace {}", self.path.display());
        true
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.is_released() {
            warn!("Workspace {} dropped without release", self.path.display());
            self.release();
        }
    }
}

/// Best-effort recursive delete; logs and continues on failure.
fn remove_tree(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => return,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => warn!("remove_dir_all {} failed: {}; deleting entry by entry", path.display(), e),
    }

    for entry in WalkDir::new(path).contents_first(true).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                continue;
            }
        };
        let result = if entry.file_type().is_dir() {
            std::fs::remove_dir(entry.path())
        } else {
            std::fs::remove_file(entry.path())
        };
        if let Err(e) = result {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {}", entry.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_empty_dir() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path().join("jobs"));
        let job_id = JobId::new();
        let ws = manager.acquire(job_id).unwrap();

        assert!(ws.path().is_dir());
        assert_eq!(ws.path(), root.path().join("jobs").join(job_id.to_string()));
        assert_eq!(std::fs::read_dir(ws.path()).unwrap().count(), 0);
        manager.release(&ws);
    }

    #[test]
    fn test_acquire_same_job_twice_fails() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let job_id = JobId::new();
        let _ws = manager.acquire(job_id).unwrap();
        assert!(matches!(manager.acquire(job_id), Err(SplitError::Workspace(_))));
    }

    #[test]
    fn test_acquire_under_a_file_fails() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let manager = WorkspaceManager::new(&blocker);
        assert!(matches!(manager.acquire(JobId::new()), Err(SplitError::Workspace(_))));
    }

    #[test]
    fn test_release_is_idempotent() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let ws = manager.acquire(JobId::new()).unwrap();
        std::fs::create_dir(ws.join("nested")).unwrap();
        std::fs::write(ws.join("nested/clip_001.mp4"), b"data").unwrap();

        manager.release(&ws);
        manager.release(&ws);
        drop(ws);

        assert_eq!(manager.released(), 1);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_release_tolerates_missing_dir() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let ws = manager.acquire(JobId::new()).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();

        manager.release(&ws);
        assert!(ws.is_released());
        assert_eq!(manager.released(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let path = {
            let ws = manager.acquire(JobId::new()).unwrap();
            std::fs::write(ws.join("source.mp4"), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(manager.released(), 1);
    }

    #[test]
    fn test_purge_stale_only_touches_job_dirs() {
        let root = TempDir::new().unwrap();
        let stale = root.path().join(JobId::new().to_string());
        std::fs::create_dir(&stale).unwrap();
        std::fs::write(stale.join("clip_001.mp4"), b"x").unwrap();
        std::fs::create_dir(root.path().join("keep-me")).unwrap();

        let manager = WorkspaceManager::new(root.path());
        assert_eq!(manager.purge_stale(), 1);
        assert!(!stale.exists());
        assert!(root.path().join("keep-me").exists());
    }
}
