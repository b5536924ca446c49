//! Orchestrator: the per-user conversation state machine
//!
//! Inbound events mutate sessions through the [`SessionStore`] only. A valid
//! segment length hands the pending file to a [`JobRunner`] on its own tokio
//! task, so the event loop never waits on media tools.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::job_runner::JobRunner;
use crate::app::messages;
use crate::domain::model::{
    ActiveJob, FileRef, Job, JobId, JobReport, Session, SessionState, UserId,
};
use crate::domain::rules::parse_segment_length;
use crate::ports::{InboundEvent, TransportPort};
use crate::session::SessionStore;

/// Limits applied to user input
#[derive(Debug, Clone, Copy)]
pub struct IntakeLimits {
    pub max_segment_seconds: u32,
    pub max_upload_bytes: u64,
}

/// What `/clip` should prompt for
enum ClipPrompt {
    Length(Option<String>),
    Video,
}

/// Outcome of handling one text message while awaiting a length
enum LengthReply {
    Started(Job, CancellationToken),
    Invalid(String),
    Busy(Session),
    NoFile,
}

pub struct Orchestrator {
    sessions: SessionStore,
    runner: JobRunner,
    transport: Arc<dyn TransportPort>,
    limits: IntakeLimits,
    terminal_grace: Duration,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        runner: JobRunner,
        transport: Arc<dyn TransportPort>,
        limits: IntakeLimits,
        terminal_grace: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sessions: runner.sessions().clone(),
            runner,
            transport,
            limits,
            terminal_grace,
            shutdown,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Consume events until the channel closes or `shutdown` fires.
    ///
    /// Jobs still running when the loop ends are awaited before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
    ) -> Vec<JobReport> {
        let mut jobs: Vec<JoinHandle<JobReport>> = Vec::new();
        let mut reports = Vec::new();

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Some(handle) = self.handle_event(event).await {
                jobs.push(handle);
            }

            let (finished, running): (Vec<_>, Vec<_>) =
                jobs.into_iter().partition(|handle| handle.is_finished());
            jobs = running;
            collect(finished, &mut reports).await;
        }

        debug!("Event loop stopped, waiting for {} running jobs", jobs.len());
        collect(jobs, &mut reports).await;
        reports
    }

    /// Handle one inbound event, returning the handle of a job it started.
    pub async fn handle_event(&self, event: InboundEvent) -> Option<JoinHandle<JobReport>> {
        match event {
            InboundEvent::File { user, file } => {
                self.on_file(&user, file).await;
                None
            }
            InboundEvent::Text { user, text } => {
                let text = text.trim();
                if text.starts_with('/') {
                    self.on_command(&user, text).await;
                    None
                } else {
                    self.on_text(&user, text).await
                }
            }
        }
    }

    async fn on_command(&self, user: &UserId, text: &str) {
        let word = text.split_whitespace().next().unwrap_or(text);
        let command = word.split('@').next().unwrap_or(word).to_ascii_lowercase();
        debug!("Command {} from {}", command, user);

        match command.as_str() {
            "/start" => {
                self.await_file(user);
                let text = messages::welcome(
                    self.limits.max_upload_bytes,
                    self.limits.max_segment_seconds,
                );
                self.reply(user, &text).await;
            }
            "/help" => self.reply(user, &messages::help()).await,
            "/clip" => match self.clip_prompt(user) {
                ClipPrompt::Length(name) => {
                    let max = self.limits.max_segment_seconds;
                    self.reply(user, &messages::ask_duration(name.as_deref(), max))
                        .await;
                }
                ClipPrompt::Video => self.reply(user, messages::send_video()).await,
            },
            "/status" => {
                let session = self.sessions.get(user);
                self.reply(user, &messages::status(session.as_ref())).await;
            }
            "/cancel" => self.on_cancel(user).await,
            _ => self.reply(user, &messages::unknown_command(word)).await,
        }
    }

    /// Move to AWAITING_FILE unless a job owns the session.
    fn await_file(&self, user: &UserId) {
        self.sessions.upsert(user, |session| {
            if session.state.is_terminal() {
                session.reset();
            }
            if !session.has_active_job() {
                session.state = SessionState::AwaitingFile;
                session.pending_file = None;
            }
            session.touch();
        });
    }

    /// Ask again for the length of a pending upload, or for a video.
    fn clip_prompt(&self, user: &UserId) -> ClipPrompt {
        self.sessions.upsert(user, |session| {
            if session.state.is_terminal() {
                session.reset();
            }
            session.touch();
            if session.has_active_job() {
                return ClipPrompt::Video;
            }
            match &session.pending_file {
                Some(file) => {
                    session.state = SessionState::AwaitingDuration;
                    ClipPrompt::Length(file.file_name.clone())
                }
                None => {
                    session.state = SessionState::AwaitingFile;
                    ClipPrompt::Video
                }
            }
        })
    }

    async fn on_cancel(&self, user: &UserId) {
        enum Cancel {
            Job,
            Input,
            Nothing,
        }

        let outcome = self
            .sessions
            .update(user, |session| {
                if session.has_active_job() {
                    if let Some(job) = &session.active_job {
                        job.cancel.cancel();
                    }
                    Cancel::Job
                } else if matches!(
                    session.state,
                    SessionState::AwaitingFile | SessionState::AwaitingDuration
                ) {
                    session.state = SessionState::Cancelled;
                    session.pending_file = None;
                    Cancel::Input
                } else {
                    Cancel::Nothing
                }
            })
            .unwrap_or(Cancel::Nothing);

        match outcome {
            Cancel::Job => {
                info!("User {} cancelled their job", user);
                self.reply(user, messages::cancelling()).await;
            }
            Cancel::Input => {
                self.sessions
                    .remove_if(user, |session| session.state == SessionState::Cancelled);
                self.reply(user, messages::input_cancelled()).await;
            }
            Cancel::Nothing => self.reply(user, messages::nothing_to_cancel()).await,
        }
    }

    async fn on_file(&self, user: &UserId, file: FileRef) {
        if file.declared_size > self.limits.max_upload_bytes {
            info!(
                "Rejecting {} byte upload from {} (limit {})",
                file.declared_size, user, self.limits.max_upload_bytes
            );
            let text = messages::too_large(file.declared_size, self.limits.max_upload_bytes);
            self.reply(user, &text).await;
            return;
        }

        let name = file.file_name.clone();
        let busy = self.sessions.upsert(user, move |session| {
            if session.state.is_terminal() {
                session.reset();
            }
            if session.has_active_job() {
                return Some(session.clone());
            }
            session.pending_file = Some(file);
            session.state = SessionState::AwaitingDuration;
            session.touch();
            None
        });

        match busy {
            Some(session) => self.reply(user, &messages::busy(&session)).await,
            None => {
                let text = messages::ask_duration(name.as_deref(), self.limits.max_segment_seconds);
                self.reply(user, &text).await;
            }
        }
    }

    async fn on_text(&self, user: &UserId, text: &str) -> Option<JoinHandle<JobReport>> {
        let max = self.limits.max_segment_seconds;
        let shutdown = &self.shutdown;

        let reply = self.sessions.upsert(user, |session| {
            if session.state.is_terminal() {
                session.reset();
            }
            if session.has_active_job() {
                return LengthReply::Busy(session.clone());
            }
            if session.state != SessionState::AwaitingDuration {
                return LengthReply::NoFile;
            }
            session.touch();

            let length = match parse_segment_length(text, max) {
                Ok(length) => length,
                Err(e) => return LengthReply::Invalid(e.to_string()),
            };
            let Some(file) = session.pending_file.take() else {
                session.state = SessionState::AwaitingFile;
                return LengthReply::NoFile;
            };

            let job_id = JobId::new();
            let cancel = shutdown.child_token();
            session.active_job = Some(ActiveJob::new(job_id, cancel.clone()));
            LengthReply::Started(Job::new(job_id, user.clone(), file, length), cancel)
        });

        match reply {
            LengthReply::Started(job, cancel) => Some(self.spawn_job(job, cancel)),
            LengthReply::Invalid(reason) => {
                debug!("Invalid segment length from {}: {}", user, reason);
                self.reply(user, &messages::invalid_length(&reason, max)).await;
                None
            }
            LengthReply::Busy(session) => {
                self.reply(user, &messages::busy(&session)).await;
                None
            }
            LengthReply::NoFile => {
                self.reply(user, messages::no_video_yet()).await;
                None
            }
        }
    }

    fn spawn_job(&self, job: Job, cancel: CancellationToken) -> JoinHandle<JobReport> {
        let runner = self.runner.clone();
        let sessions = self.sessions.clone();
        let grace = self.terminal_grace;
        info!("Starting job {} for {}", job.job_id, job.user_id);

        tokio::spawn(async move {
            let report = runner.run(job, cancel).await;
            schedule_removal(sessions, report.user_id.clone(), report.job_id, grace);
            report
        })
    }

    async fn reply(&self, user: &UserId, text: &str) {
        if let Err(e) = self.transport.send_text(user, text).await {
            warn!("Reply to {} failed: {}", user, e);
        }
    }
}

async fn collect(handles: Vec<JoinHandle<JobReport>>, reports: &mut Vec<JobReport>) {
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => warn!("Job task ended abnormally: {}", e),
        }
    }
}

/// Drop a finished job's session after `grace`, unless the user moved on.
fn schedule_removal(sessions: SessionStore, user: UserId, job_id: JobId, grace: Duration) {
    tokio::spawn(async move {
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        let removed = sessions.remove_if(&user, |session| {
            session.state.is_terminal()
                && session.active_job.as_ref().map(|a| a.job_id) == Some(job_id)
        });
        if removed.is_some() {
            debug!("Removed finished session of {}", user);
        }
    });
}
