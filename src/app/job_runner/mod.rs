//! Job runner: drives one job from PROBING to a terminal state
//!
//! The runner owns the [`Job`] and its [`Workspace`]. Segment cuts run on a
//! `JoinSet` bounded by a per-job and a global semaphore; every task is
//! drained before the workspace is released, and the workspace is released
//! exactly once on every exit path.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::app::messages;
use crate::domain::model::*;
use crate::engine::{CutSource, Cutter};
use crate::error::{SplitError, SplitResult};
use crate::planner::{self, KeyframeIndex};
use crate::ports::{FetchPort, TransportPort};
use crate::probe::MediaProber;
use crate::session::SessionStore;
use crate::utils::path::source_file_name;
use crate::workspace::{Workspace, WorkspaceManager};

/// Shared collaborators for running jobs
#[derive(Clone)]
pub struct JobRunner {
    prober: MediaProber,
    cutter: Cutter,
    fetch: Arc<dyn FetchPort>,
    transport: Arc<dyn TransportPort>,
    workspaces: WorkspaceManager,
    sessions: SessionStore,
    global_cuts: Arc<Semaphore>,
    per_job_concurrency: usize,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prober: MediaProber,
        cutter: Cutter,
        fetch: Arc<dyn FetchPort>,
        transport: Arc<dyn TransportPort>,
        workspaces: WorkspaceManager,
        sessions: SessionStore,
        global_cuts: Arc<Semaphore>,
        per_job_concurrency: usize,
    ) -> Self {
        Self {
            prober,
            cutter,
            fetch,
            transport,
            workspaces,
            sessions,
            global_cuts,
            per_job_concurrency: per_job_concurrency.max(1),
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run `job` to completion and report the outcome.
    ///
    /// Exactly one terminal message is sent to the user.
    pub async fn run(&self, job: Job, cancel: CancellationToken) -> JobReport {
        let span = info_span!("job", job_id = %job.job_id, user = %job.user_id);
        self.run_inner(job, cancel).instrument(span).await
    }

    async fn run_inner(&self, mut job: Job, cancel: CancellationToken) -> JobReport {
        let started = Instant::now();
        let mut deliveries = Vec::new();
        info!("Job started: {}s clips", job.segment_length);

        let result = match self.workspaces.acquire(job.job_id) {
            Ok(workspace) => {
                let workspace = Arc::new(workspace);
                let result = self
                    .process(&mut job, &workspace, &cancel, &mut deliveries)
                    .await;
                // All cut tasks have been drained by now
                self.workspaces.release(&workspace);
                result
            }
            Err(e) => Err(e),
        };

        self.finish(job, result, deliveries, started.elapsed()).await
    }

    async fn process(
        &self,
        job: &mut Job,
        workspace: &Arc<Workspace>,
        cancel: &CancellationToken,
        deliveries: &mut Vec<DeliveryOutcome>,
    ) -> SplitResult<()> {
        // PROBING
        self.advance(job, SessionState::Probing, cancel)?;
        self.notify(&job.user_id, messages::probing()).await;

        let source_path = workspace.join(source_file_name(&job.source.extension()));
        tokio::select! {
            _ = cancel.cancelled() => return Err(SplitError::Cancelled),
            fetched = self.fetch.fetch(&job.source, &source_path) => {
                info!("Fetched {} bytes", fetched?);
            }
        }
        job.source_path = Some(source_path.clone());

        let report = self.prober.probe(&source_path, cancel).await?;
        job.source_duration = Some(report.duration);
        self.notify(&job.user_id, &messages::media_summary(&report)).await;

        // PLANNING
        self.advance(job, SessionState::Planning, cancel)?;
        let outcome = planner::plan(report.duration, f64::from(job.segment_length))?;
        job.set_plan(outcome.clone());

        let plan = match outcome {
            PlanOutcome::WholeFile { .. } => {
                info!("Source fits in one clip, delivering unchanged");
                self.advance(job, SessionState::Delivering, cancel)?;
                let caption = messages::whole_file_caption(job.segment_length);
                deliveries.push(self.deliver(&job.user_id, 0, &source_path, &caption).await);
                return Ok(());
            }
            PlanOutcome::Split { plan } => plan,
        };

        // CUTTING
        self.advance(job, SessionState::Cutting, cancel)?;
        let total = plan.len();
        self.update_session(job, |active| {
            active.segments_total = total;
            active.segments_done = 0;
        });
        self.notify(&job.user_id, &messages::cutting(total, job.segment_length)).await;

        let source = Arc::new(CutSource {
            path: source_path,
            extension: job.source.extension(),
            keyframes: KeyframeIndex::new(report.keyframes.clone()),
            video_bit_rate: report.details.bit_rate,
        });
        for output in self.cut_all(job, &plan, source, workspace, cancel).await? {
            job.push_output(output);
        }

        // DELIVERING
        self.advance(job, SessionState::Delivering, cancel)?;
        let outputs = job.outputs().to_vec();
        for output in &outputs {
            if cancel.is_cancelled() {
                return Err(SplitError::Cancelled);
            }
            let caption = messages::clip_caption(output.index + 1, total, job.segment_length);
            deliveries.push(
                self.deliver(&job.user_id, output.index, &output.path, &caption)
                    .await,
            );
        }
        Ok(())
    }

    /// Cut every entry, bounded by the per-job and global limits.
    ///
    /// The first permanent failure cancels the remaining cuts. Results are
    /// returned in index order regardless of completion order.
    async fn cut_all(
        &self,
        job: &Job,
        plan: &SegmentPlan,
        source: Arc<CutSource>,
        workspace: &Arc<Workspace>,
        cancel: &CancellationToken,
    ) -> SplitResult<Vec<SegmentOutput>> {
        let cuts = cancel.child_token();
        let per_job = Arc::new(Semaphore::new(self.per_job_concurrency));
        let mut tasks = JoinSet::new();

        for entry in plan.entries().iter().copied() {
            let cutter = self.cutter.clone();
            let source = Arc::clone(&source);
            let workspace = Arc::clone(workspace);
            let per_job = Arc::clone(&per_job);
            let global = Arc::clone(&self.global_cuts);
            let cuts = cuts.clone();
            tasks.spawn(
                async move {
                    cut_segment(&cutter, &source, &entry, &workspace, &per_job, &global, &cuts)
                        .await
                }
                .in_current_span(),
            );
        }

        let mut outputs = Vec::with_capacity(plan.len());
        let mut failure: Option<SplitError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(output)) => {
                    outputs.push(output);
                    self.update_session(job, |active| active.segments_done += 1);
                }
                Ok(Err(e)) if e.is_cancellation() => {}
                Ok(Err(e)) => {
                    if failure.is_none() {
                        error!("Permanent cut failure: {}", e);
                        cuts.cancel();
                        failure = Some(e);
                    }
                }
                Err(join_error) => {
                    if failure.is_none() {
                        error!("Cut task aborted: {}", join_error);
                        cuts.cancel();
                        failure = Some(SplitError::Tool {
                            tool: "cut task".to_string(),
                            message: join_error.to_string(),
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        outputs.sort_by_key(|o| o.index);
        Ok(outputs)
    }

    async fn deliver(
        &self,
        user: &UserId,
        index: usize,
        path: &Path,
        caption: &str,
    ) -> DeliveryOutcome {
        match self.transport.send_file(user, path, caption).await {
            Ok(()) => DeliveryOutcome {
                index,
                delivered: true,
                error: None,
            },
            Err(e) => {
                warn!("Delivery of clip {} failed: {}", index + 1, e);
                DeliveryOutcome {
                    index,
                    delivered: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn finish(
        &self,
        mut job: Job,
        result: SplitResult<()>,
        deliveries: Vec<DeliveryOutcome>,
        elapsed: Duration,
    ) -> JobReport {
        let (state, failure) = match &result {
            Ok(()) => (SessionState::Done, None),
            Err(SplitError::Cancelled) => (SessionState::Cancelled, None),
            Err(e) => {
                error!("Job failed: {}", e);
                (SessionState::Failed, Some(user_reason(e)))
            }
        };

        job.state = state;
        self.set_session_state(&job, state);

        let report = JobReport {
            job_id: job.job_id,
            user_id: job.user_id.clone(),
            state,
            whole_file: job.plan().map(PlanOutcome::is_whole_file).unwrap_or(false),
            entries: job.plan().map(|p| p.entries().to_vec()).unwrap_or_default(),
            outputs: job.outputs().to_vec(),
            deliveries,
            failure,
            elapsed,
        };

        let text = match state {
            SessionState::Done => messages::done(&report),
            SessionState::Cancelled => messages::cancelled().to_string(),
            _ => messages::failed(report.failure.as_deref().unwrap_or("unknown error")),
        };
        self.notify(&job.user_id, &text).await;

        info!(
            "Job finished: {} ({} outputs, {}/{} delivered, {:?})",
            state,
            report.outputs.len(),
            report.delivered_count(),
            report.deliveries.len(),
            elapsed
        );
        report
    }

    /// Move the job forward, refusing once cancelled.
    fn advance(
        &self,
        job: &mut Job,
        next: SessionState,
        cancel: &CancellationToken,
    ) -> SplitResult<()> {
        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }
        if !job.state.can_transition_to(next) {
            return Err(SplitError::Validation(format!(
                "illegal transition {} -> {}",
                job.state, next
            )));
        }
        info!("{} -> {}", job.state, next);
        job.state = next;
        self.set_session_state(job, next);
        Ok(())
    }

    fn set_session_state(&self, job: &Job, state: SessionState) {
        let job_id = job.job_id;
        self.sessions.update(&job.user_id, |session| {
            let owns = session.active_job.as_ref().map(|a| a.job_id) == Some(job_id);
            if owns {
                session.state = state;
                session.touch();
            }
        });
    }

    fn update_session(&self, job: &Job, f: impl FnOnce(&mut ActiveJob)) {
        let job_id = job.job_id;
        self.sessions.update(&job.user_id, |session| {
            if let Some(active) = session.active_job.as_mut().filter(|a| a.job_id == job_id) {
                f(active);
                session.touch();
            }
        });
    }

    async fn notify(&self, user: &UserId, text: &str) {
        if let Err(e) = self.transport.send_text(user, text).await {
            warn!("Status message to {} failed: {}", user, e);
        }
    }
}

/// Cut one segment, retrying once in re-encode mode on a tool failure.
async fn cut_segment(
    cutter: &Cutter,
    source: &CutSource,
    entry: &SegmentPlanEntry,
    workspace: &Workspace,
    per_job: &Arc<Semaphore>,
    global: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> SplitResult<SegmentOutput> {
    let _job_slot = acquire(per_job, cancel).await?;
    let _global_slot = acquire(global, cancel).await?;

    match cutter
        .cut(source, entry, workspace, CutMode::StreamCopy, cancel)
        .await
    {
        Ok(output) => Ok(output),
        Err(e) if e.is_retryable() && !cancel.is_cancelled() => {
            warn!("Segment {} failed ({}), retrying with re-encode", entry.number(), e);
            let mut output = cutter
                .cut(source, entry, workspace, CutMode::ReEncode, cancel)
                .await?;
            output.attempts = 2;
            Ok(output)
        }
        Err(e) => Err(e),
    }
}

async fn acquire(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> SplitResult<OwnedSemaphorePermit> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SplitError::Cancelled),
        permit = Arc::clone(semaphore).acquire_owned() => {
            permit.map_err(|_| SplitError::Cancelled)
        }
    }
}

/// Friendly failure reason; raw errors stay in the logs.
fn user_reason(err: &SplitError) -> String {
    match err {
        SplitError::Probe { .. } => "the file could not be read as a video".to_string(),
        SplitError::Cut { index, .. } => format!("clip {} could not be produced", index + 1),
        SplitError::Tool { .. } => "a clip could not be produced".to_string(),
        SplitError::Timeout { .. } => "processing took too long".to_string(),
        SplitError::Workspace(_) | SplitError::Io(_) => {
            "the server ran out of temporary space".to_string()
        }
        SplitError::Transport(_) => "the video could not be downloaded".to_string(),
        SplitError::InvalidDuration(_) => "the video length could not be split".to_string(),
        _ => "an internal error occurred".to_string(),
    }
}
