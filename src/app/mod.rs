// Application layer: conversation state machine and job execution

pub mod container;
pub mod job_runner;
pub mod messages;
pub mod orchestrator;

pub use container::AppContainer;
pub use job_runner::JobRunner;
pub use orchestrator::{IntakeLimits, Orchestrator};
