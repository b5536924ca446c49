//! SplitX video splitter library
//!
//! Splits a video into fixed-length clips, using keyframe-aligned stream copy
//! where possible and re-encoding where not. Per-user sessions drive jobs
//! through probing, planning, cutting and delivery.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod planner;
pub mod ports;
pub mod probe;
pub mod session;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use adapters::toml_config::AppConfig;
pub use app::{AppContainer, JobRunner, Orchestrator};
pub use domain::model::{
    FileRef, Job, JobId, JobReport, PlanOutcome, SegmentPlan, SegmentPlanEntry, Session,
    SessionState, UserId,
};
pub use error::{SplitError, SplitResult};
pub use session::SessionStore;
pub use workspace::{Workspace, WorkspaceManager};
