// Domain models - Core types and data structures

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifies a remote user; unique key of the session store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifies one split request; also names the job's workspace directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from a workspace directory name.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound file reference as delivered by a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    /// Where the transport can fetch the bytes from
    pub location: PathBuf,
    /// Size announced by the sender
    pub declared_size: u64,
    /// Original file name, if the sender provided one
    pub file_name: Option<String>,
}

impl FileRef {
    pub fn new(location: impl Into<PathBuf>, declared_size: u64) -> Self {
        let location = location.into();
        let file_name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            location,
            declared_size,
            file_name,
        }
    }

    /// Extension used for clip outputs; falls back to `mp4`.
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .map(std::path::Path::new)
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "mp4".to_string())
    }
}

/// Conversational and processing state of a user's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    AwaitingFile,
    AwaitingDuration,
    Probing,
    Planning,
    Cutting,
    Delivering,
    Done,
    Failed,
    Cancelled,
}

impl SessionState {
    /// `Done`, `Failed` and `Cancelled` end a job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::AwaitingFile => "AWAITING_FILE",
            Self::AwaitingDuration => "AWAITING_DURATION",
            Self::Probing => "PROBING",
            Self::Planning => "PLANNING",
            Self::Cutting => "CUTTING",
            Self::Delivering => "DELIVERING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle the session keeps on the job that currently owns it
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub job_id: JobId,
    pub cancel: CancellationToken,
    pub segments_total: usize,
    pub segments_done: usize,
}

impl ActiveJob {
    pub fn new(job_id: JobId, cancel: CancellationToken) -> Self {
        Self {
            job_id,
            cancel,
            segments_total: 0,
            segments_done: 0,
        }
    }
}

/// Per-user record held by the session store
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub state: SessionState,
    /// File received while awaiting the segment length
    pub pending_file: Option<FileRef>,
    pub active_job: Option<ActiveJob>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            state: SessionState::Idle,
            pending_file: None,
            active_job: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether a non-terminal job currently owns this session.
    pub fn has_active_job(&self) -> bool {
        self.active_job.is_some() && !self.state.is_terminal()
    }

    /// Start over after a finished job, keeping identity and creation time.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.pending_file = None;
        self.active_job = None;
        self.touch();
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or_default()
    }
}

/// One planned output range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlanEntry {
    /// Zero-based position in the plan
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Expected duration, `end - start`
    pub duration: f64,
}

impl SegmentPlanEntry {
    pub(crate) fn new(index: usize, start: f64, end: f64) -> Self {
        Self {
            index,
            start,
            end,
            duration: end - start,
        }
    }

    /// One-based number used in file names and captions.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Ordered, immutable list of plan entries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPlan {
    entries: Vec<SegmentPlanEntry>,
    segment_length: f64,
    source_duration: f64,
}

impl SegmentPlan {
    pub(crate) fn new(
        entries: Vec<SegmentPlanEntry>,
        segment_length: f64,
        source_duration: f64,
    ) -> Self {
        Self {
            entries,
            segment_length,
            source_duration,
        }
    }

    pub fn entries(&self) -> &[SegmentPlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn segment_length(&self) -> f64 {
        self.segment_length
    }

    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }
}

/// Planner result; a whole-file outcome short-circuits cutting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanOutcome {
    WholeFile { entry: SegmentPlanEntry },
    Split { plan: SegmentPlan },
}

impl PlanOutcome {
    pub fn entries(&self) -> &[SegmentPlanEntry] {
        match self {
            PlanOutcome::WholeFile { entry } => std::slice::from_ref(entry),
            PlanOutcome::Split { plan } => plan.entries(),
        }
    }

    pub fn is_whole_file(&self) -> bool {
        matches!(self, PlanOutcome::WholeFile { .. })
    }
}

/// Cutting mode for one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMode {
    /// Repackage encoded data without decoding
    StreamCopy,
    /// Decode and encode for frame-accurate boundaries
    ReEncode,
}

impl fmt::Display for CutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutMode::StreamCopy => f.write_str("stream_copy"),
            CutMode::ReEncode => f.write_str("re_encode"),
        }
    }
}

/// Effective mode and start offset chosen for a plan entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutDecision {
    pub mode: CutMode,
    /// Offset handed to the tool; may precede the entry start after snapping
    pub start: f64,
    /// How far `start` was moved back from the planned start
    pub drift: f64,
}

/// Additional probe details shown to the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaDetails {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub bit_rate: Option<u64>,
    pub size_bytes: Option<u64>,
}

/// Result of inspecting a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub duration: f64,
    /// Ascending keyframe timestamps of the first video stream
    pub keyframes: Vec<f64>,
    pub codec: String,
    #[serde(default)]
    pub details: MediaDetails,
}

/// A segment file produced in the workspace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentOutput {
    pub index: usize,
    pub path: PathBuf,
    pub mode: CutMode,
    pub drift: f64,
    pub attempts: u8,
}

/// Per-segment delivery result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub index: usize,
    pub delivered: bool,
    pub error: Option<String>,
}

/// A split request, owned by the runner processing it
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub user_id: UserId,
    pub source: FileRef,
    pub source_path: Option<PathBuf>,
    pub source_duration: Option<f64>,
    pub segment_length: u32,
    plan: Option<PlanOutcome>,
    outputs: Vec<SegmentOutput>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: JobId, user_id: UserId, source: FileRef, segment_length: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            user_id,
            source,
            source_path: None,
            source_duration: None,
            segment_length,
            plan: None,
            outputs: Vec::new(),
            state: SessionState::AwaitingDuration,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn plan(&self) -> Option<&PlanOutcome> {
        self.plan.as_ref()
    }

    /// Record the plan; a job is planned at most once.
    pub fn set_plan(&mut self, plan: PlanOutcome) -> bool {
        if self.plan.is_some() {
            return false;
        }
        self.plan = Some(plan);
        self.last_activity = Utc::now();
        true
    }

    pub fn outputs(&self) -> &[SegmentOutput] {
        &self.outputs
    }

    /// Outputs only ever grow; the list is kept in index order.
    pub fn push_output(&mut self, output: SegmentOutput) {
        let pos = self
            .outputs
            .partition_point(|existing| existing.index < output.index);
        self.outputs.insert(pos, output);
        self.last_activity = Utc::now();
    }
}

/// Final outcome of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub user_id: UserId,
    pub state: SessionState,
    pub whole_file: bool,
    pub entries: Vec<SegmentPlanEntry>,
    pub outputs: Vec<SegmentOutput>,
    pub deliveries: Vec<DeliveryOutcome>,
    pub failure: Option<String>,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.delivered).count()
    }

    pub fn failed_deliveries(&self) -> Vec<usize> {
        self.deliveries
            .iter()
            .filter(|d| !d.delivered)
            .map(|d| d.index + 1)
            .collect()
    }
}

#[cfg(test)]
mod tests;
