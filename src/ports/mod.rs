// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::model::*;
use crate::error::SplitResult;

/// Port for media file inspection
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Duration, codec, details and keyframe timestamps of a source
    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<ProbeReport>;

    /// Container duration only; used to check produced segments
    async fn probe_duration(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<f64>;
}

/// Encoder settings used by re-encode cuts
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub crf: u8,
    pub preset: String,
    pub audio_codec: String,
    /// Source video bitrate; targeted instead of CRF when known
    pub video_bit_rate: Option<u64>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            crf: 18,
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            video_bit_rate: None,
        }
    }
}

/// One media tool invocation producing one segment file
#[derive(Debug, Clone, PartialEq)]
pub struct CutInvocation {
    pub index: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub start: f64,
    pub duration: f64,
    pub mode: CutMode,
    pub encode: EncodeSettings,
}

/// Port for running the media tool
#[async_trait]
pub trait ExecutePort: Send + Sync {
    /// Run one cut; success means the tool exited 0
    async fn execute_cut(
        &self,
        invocation: &CutInvocation,
        cancel: &CancellationToken,
    ) -> SplitResult<()>;
}

/// Port for materialising an inbound file inside a workspace
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Write the referenced bytes to `dest`, returning the byte count
    async fn fetch(&self, file: &FileRef, dest: &Path) -> SplitResult<u64>;
}

/// Outbound transport contract
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn send_text(&self, user: &UserId, text: &str) -> SplitResult<()>;

    async fn send_file(&self, user: &UserId, path: &Path, caption: &str) -> SplitResult<()>;
}

/// Inbound transport events
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    File { user: UserId, file: FileRef },
    Text { user: UserId, text: String },
}

impl InboundEvent {
    pub fn user(&self) -> &UserId {
        match self {
            InboundEvent::File { user, .. } | InboundEvent::Text { user, .. } => user,
        }
    }
}
