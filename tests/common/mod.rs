//! Shared fakes for integration tests; no media tools are needed.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use splitx_cli::adapters::LocalFetch;
use splitx_cli::domain::model::{CutMode, MediaDetails, ProbeReport};
use splitx_cli::ports::{CutInvocation, ExecutePort, ProbePort, TransportPort};
use splitx_cli::{AppConfig, AppContainer, FileRef, SplitError, SplitResult, UserId};

/// Reports a fixed duration and keyframe list for every file
pub struct FakeProbe {
    pub duration: f64,
    pub keyframes: Vec<f64>,
}

impl FakeProbe {
    pub fn new(duration: f64, keyframes: Vec<f64>) -> Self {
        Self { duration, keyframes }
    }
}

#[async_trait]
impl ProbePort for FakeProbe {
    async fn probe(&self, _path: &Path, _cancel: &CancellationToken) -> SplitResult<ProbeReport> {
        Ok(ProbeReport {
            duration: self.duration,
            keyframes: self.keyframes.clone(),
            codec: "h264".to_string(),
            details: MediaDetails::default(),
        })
    }

    async fn probe_duration(&self, _path: &Path, _cancel: &CancellationToken) -> SplitResult<f64> {
        Ok(self.duration)
    }
}

/// Stands in for ffmpeg: writes a few bytes per clip
#[derive(Default)]
pub struct FakeCutter {
    pub calls: Mutex<Vec<(usize, CutMode)>>,
    fail: HashSet<(usize, CutMode)>,
    block: bool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeCutter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every cut of `index` in `mode`.
    pub fn failing(mut self, index: usize, mode: CutMode) -> Self {
        self.fail.insert((index, mode));
        self
    }

    /// Leave a partial file and wait for cancellation.
    pub fn blocking(mut self) -> Self {
        self.block = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn modes_for(&self, index: usize) -> Vec<CutMode> {
        self.calls
            .lock()
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, mode)| *mode)
            .collect()
    }
}

#[async_trait]
impl ExecutePort for FakeCutter {
    async fn execute_cut(
        &self,
        invocation: &CutInvocation,
        cancel: &CancellationToken,
    ) -> SplitResult<()> {
        self.calls.lock().push((invocation.index, invocation.mode));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = if self.fail.contains(&(invocation.index, invocation.mode)) {
            Err(SplitError::Tool {
                tool: "ffmpeg".to_string(),
                message: "exited with exit status: 1: Invalid data found".to_string(),
            })
        } else if self.block {
            tokio::fs::write(&invocation.output, b"partial").await?;
            cancel.cancelled().await;
            Err(SplitError::Cancelled)
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tokio::fs::write(&invocation.output, format!("clip {}", invocation.index)).await?;
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A file handed to the transport
#[derive(Debug, Clone)]
pub struct SentFile {
    pub user: UserId,
    pub name: String,
    pub caption: String,
    /// Whether the file existed when it was sent
    pub existed: bool,
}

/// Records everything sent; can fail chosen file deliveries
#[derive(Default)]
pub struct RecordingTransport {
    pub texts: Mutex<Vec<(UserId, String)>>,
    pub files: Mutex<Vec<SentFile>>,
    fail_captions: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail deliveries whose caption starts with `prefix`.
    pub fn failing_caption(mut self, prefix: &str) -> Self {
        self.fail_captions.push(prefix.to_string());
        self
    }

    pub fn texts_for(&self, user: &UserId) -> Vec<String> {
        self.texts
            .lock()
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn last_text(&self, user: &UserId) -> Option<String> {
        self.texts_for(user).pop()
    }

    pub fn captions(&self) -> Vec<String> {
        self.files.lock().iter().map(|f| f.caption.clone()).collect()
    }
}

#[async_trait]
impl TransportPort for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_text(&self, user: &UserId, text: &str) -> SplitResult<()> {
        self.texts.lock().push((user.clone(), text.to_string()));
        Ok(())
    }

    async fn send_file(&self, user: &UserId, path: &Path, caption: &str) -> SplitResult<()> {
        self.files.lock().push(SentFile {
            user: user.clone(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            caption: caption.to_string(),
            existed: path.is_file(),
        });
        if self.fail_captions.iter().any(|p| caption.starts_with(p.as_str())) {
            return Err(SplitError::Transport("peer went away".to_string()));
        }
        Ok(())
    }
}

/// Temp dirs plus a container wired to fakes
pub struct Harness {
    pub dir: TempDir,
    pub config: AppConfig,
    pub container: AppContainer,
    pub cutter: Arc<FakeCutter>,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    pub fn new(probe: FakeProbe, cutter: FakeCutter, transport: RecordingTransport) -> Self {
        Self::with_config(probe, cutter, transport, |_| {})
    }

    pub fn with_config(
        probe: FakeProbe,
        cutter: FakeCutter,
        transport: RecordingTransport,
        tweak: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut config = AppConfig::default();
        config.temp_root = dir.path().join("work");
        config.limits.per_job_concurrency = 2;
        config.limits.global_concurrency = 4;
        config.timeouts.terminal_grace_millis = 0;
        tweak(&mut config);

        let cutter = Arc::new(cutter);
        let transport = Arc::new(transport);
        let container = AppContainer::with_ports(
            &config,
            Arc::new(probe),
            cutter.clone(),
            Arc::new(LocalFetch::new(config.max_upload_bytes())),
            transport.clone(),
        );

        Self {
            dir,
            config,
            container,
            cutter,
            transport,
        }
    }

    /// Write a fake upload and return a reference to it.
    pub fn upload(&self, name: &str) -> FileRef {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"not really a video").expect("write upload");
        FileRef::new(path, 18)
    }

    /// Files left anywhere under the temp root.
    pub fn residual_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.config.temp_root)
            .into_iter()
            .flatten()
            .filter(|e| e.path() != self.config.temp_root.as_path())
            .map(|e| e.into_path())
            .collect()
    }
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
