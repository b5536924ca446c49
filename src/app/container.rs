use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::toml_config::AppConfig;
use crate::adapters::{FFmpegAdapter, FFprobeAdapter, LocalFetch, RetryingTransport};
use crate::app::job_runner::JobRunner;
use crate::app::orchestrator::{IntakeLimits, Orchestrator};
use crate::engine::Cutter;
use crate::error::SplitResult;
use crate::output::SegmentVerifier;
use crate::planner::CutPolicy;
use crate::ports::{EncodeSettings, ExecutePort, FetchPort, ProbePort, TransportPort};
use crate::probe::MediaProber;
use crate::session::SessionStore;
use crate::workspace::WorkspaceManager;

/// Wires configuration and ports into the runner and orchestrator
pub struct AppContainer {
    config: AppConfig,
    prober: MediaProber,
    runner: JobRunner,
    transport: Arc<dyn TransportPort>,
}

impl AppContainer {
    /// Build with the ffprobe/ffmpeg adapters and local file intake.
    ///
    /// `transport` is wrapped with the configured delivery retries.
    pub fn from_config<T>(config: &AppConfig, transport: T) -> SplitResult<Self>
    where
        T: TransportPort + 'static,
    {
        let ffprobe = config.tools.resolve_ffprobe()?;
        let ffmpeg = config.tools.resolve_ffmpeg()?;
        info!("Using {} and {}", ffprobe.display(), ffmpeg.display());

        let probe = Arc::new(FFprobeAdapter::new(ffprobe, config.timeouts.probe()));
        let exec = Arc::new(FFmpegAdapter::new(ffmpeg, config.timeouts.cut()));
        let fetch = Arc::new(LocalFetch::new(config.max_upload_bytes()));
        let transport = Arc::new(RetryingTransport::new(
            transport,
            config.delivery.attempts,
            config.delivery.backoff(),
        ));

        Ok(Self::with_ports(config, probe, exec, fetch, transport))
    }

    /// Build from explicit ports.
    pub fn with_ports(
        config: &AppConfig,
        probe: Arc<dyn ProbePort>,
        exec: Arc<dyn ExecutePort>,
        fetch: Arc<dyn FetchPort>,
        transport: Arc<dyn TransportPort>,
    ) -> Self {
        let prober = MediaProber::new(probe);

        let verifier = if config.cutter.verify_duration {
            SegmentVerifier::with_duration_check(prober.clone(), config.cutter.duration_slack_secs)
        } else {
            SegmentVerifier::size_only()
        };
        let encode = EncodeSettings {
            crf: config.cutter.crf,
            preset: config.cutter.preset.clone(),
            audio_codec: config.cutter.audio_codec.clone(),
            video_bit_rate: None,
        };
        let cutter = Cutter::new(
            exec,
            verifier,
            CutPolicy::new(config.cutter.keyframe_tolerance_secs),
        )
        .with_encode_settings(encode);

        let runner = JobRunner::new(
            prober.clone(),
            cutter,
            fetch,
            Arc::clone(&transport),
            WorkspaceManager::new(config.temp_root.clone()),
            SessionStore::new(),
            Arc::new(Semaphore::new(config.limits.global_concurrency)),
            config.limits.per_job_concurrency,
        );

        Self {
            config: config.clone(),
            prober,
            runner,
            transport,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn prober(&self) -> &MediaProber {
        &self.prober
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn transport(&self) -> Arc<dyn TransportPort> {
        Arc::clone(&self.transport)
    }

    pub fn sessions(&self) -> &SessionStore {
        self.runner.sessions()
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        self.runner.workspaces()
    }

    pub fn orchestrator(&self, shutdown: CancellationToken) -> Orchestrator {
        Orchestrator::new(
            self.runner.clone(),
            self.transport(),
            IntakeLimits {
                max_segment_seconds: self.config.limits.max_segment_seconds,
                max_upload_bytes: self.config.max_upload_bytes(),
            },
            self.config.timeouts.terminal_grace(),
            shutdown,
        )
    }
}
