//! Cutter: produces one segment file per plan entry

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::model::{CutMode, SegmentOutput, SegmentPlanEntry};
use crate::error::{SplitError, SplitResult};
use crate::output::SegmentVerifier;
use crate::planner::{CutPolicy, KeyframeIndex};
use crate::ports::{CutInvocation, EncodeSettings, ExecutePort};
use crate::utils::path::clip_path;
use crate::workspace::Workspace;

/// Per-job facts about the source that every cut needs
#[derive(Debug, Clone)]
pub struct CutSource {
    pub path: PathBuf,
    /// Extension given to produced clips
    pub extension: String,
    pub keyframes: KeyframeIndex,
    /// Source video bitrate, targeted by re-encodes
    pub video_bit_rate: Option<u64>,
}

/// Drives the media tool for single segments
#[derive(Clone)]
pub struct Cutter {
    exec: Arc<dyn ExecutePort>,
    verifier: SegmentVerifier,
    policy: CutPolicy,
    encode: EncodeSettings,
}

impl Cutter {
    pub fn new(exec: Arc<dyn ExecutePort>, verifier: SegmentVerifier, policy: CutPolicy) -> Self {
        Self {
            exec,
            verifier,
            policy,
            encode: EncodeSettings::default(),
        }
    }

    pub fn with_encode_settings(mut self, encode: EncodeSettings) -> Self {
        self.encode = encode;
        self
    }

    pub fn policy(&self) -> &CutPolicy {
        &self.policy
    }

    /// Cut `entry` out of `source` into `workspace`.
    ///
    /// Stream copy may be widened back to the preceding keyframe or turned
    /// into a re-encode by the cut policy. On any failure the partial output
    /// is removed and the error carries the entry index.
    pub async fn cut(
        &self,
        source: &CutSource,
        entry: &SegmentPlanEntry,
        workspace: &Workspace,
        mode: CutMode,
        cancel: &CancellationToken,
    ) -> SplitResult<SegmentOutput> {
        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let decision = self.policy.decide(entry, &source.keyframes, mode);
        let output = clip_path(workspace.path(), entry.number(), &source.extension);
        let duration = entry.end - decision.start;

        let mut encode = self.encode.clone();
        encode.video_bit_rate = source.video_bit_rate;

        let invocation = CutInvocation {
            index: entry.index,
            source: source.path.clone(),
            output: output.clone(),
            start: decision.start,
            duration,
            mode: decision.mode,
            encode,
        };

        debug!(
            "Cutting segment {} [{:.3}, {:.3}) as {} from {:.3}",
            entry.number(),
            entry.start,
            entry.end,
            decision.mode,
            decision.start
        );

        let result = match self.exec.execute_cut(&invocation, cancel).await {
            Ok(()) => self
                .verifier
                .verify(entry.index, &output, duration, cancel)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            discard(&output).await;
            return Err(e.into_cut(entry.index));
        }

        info!(
            "Segment {} done ({}, drift {:.3}s)",
            entry.number(),
            decision.mode,
            decision.drift
        );

        Ok(SegmentOutput {
            index: entry.index,
            path: output,
            mode: decision.mode,
            drift: decision.drift,
            attempts: 1,
        })
    }
}

async fn discard(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove partial {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::JobId;
    use crate::workspace::WorkspaceManager;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Records invocations; optionally leaves an empty file behind
    #[derive(Default)]
    struct ScriptedExec {
        seen: Mutex<Vec<CutInvocation>>,
        write_empty: bool,
    }

    #[async_trait]
    impl ExecutePort for ScriptedExec {
        async fn execute_cut(
            &self,
            invocation: &CutInvocation,
            _cancel: &CancellationToken,
        ) -> SplitResult<()> {
            self.seen.lock().push(invocation.clone());
            let body: &[u8] = if self.write_empty { b"" } else { b"clip-bytes" };
            tokio::fs::write(&invocation.output, body).await?;
            Ok(())
        }
    }

    fn source(keyframes: Vec<f64>) -> CutSource {
        CutSource {
            path: PathBuf::from("/media/source.mp4"),
            extension: "mp4".into(),
            keyframes: KeyframeIndex::new(keyframes),
            video_bit_rate: Some(1_000_000),
        }
    }

    #[tokio::test]
    async fn test_cut_snaps_and_names_output() {
        let root = TempDir::new().unwrap();
        let ws = WorkspaceManager::new(root.path()).acquire(JobId::new()).unwrap();
        let exec = Arc::new(ScriptedExec::default());
        let cutter = Cutter::new(exec.clone(), SegmentVerifier::size_only(), CutPolicy::new(1.0));

        let entry = SegmentPlanEntry::new(1, 30.0, 60.0);
        let out = cutter
            .cut(
                &source(vec![0.0, 29.2]),
                &entry,
                &ws,
                CutMode::StreamCopy,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(out.path, ws.join("clip_002.mp4"));
        assert_eq!(out.mode, CutMode::StreamCopy);
        assert!((out.drift - 0.8).abs() < 1e-9);
        let seen = exec.seen.lock();
        assert_eq!(seen[0].start, 29.2);
        assert!((seen[0].duration - 30.8).abs() < 1e-9);
        assert_eq!(seen[0].encode.video_bit_rate, Some(1_000_000));
    }

    #[tokio::test]
    async fn test_cut_far_from_keyframe_reencodes() {
        let root = TempDir::new().unwrap();
        let ws = WorkspaceManager::new(root.path()).acquire(JobId::new()).unwrap();
        let exec = Arc::new(ScriptedExec::default());
        let cutter = Cutter::new(exec.clone(), SegmentVerifier::size_only(), CutPolicy::new(1.0));

        let entry = SegmentPlanEntry::new(1, 30.0, 60.0);
        let out = cutter
            .cut(
                &source(vec![0.0, 20.0]),
                &entry,
                &ws,
                CutMode::StreamCopy,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.mode, CutMode::ReEncode);
        assert_eq!(exec.seen.lock()[0].mode, CutMode::ReEncode);
    }

    #[tokio::test]
    async fn test_zero_byte_output_is_cut_error_and_removed() {
        let root = TempDir::new().unwrap();
        let ws = WorkspaceManager::new(root.path()).acquire(JobId::new()).unwrap();
        let exec = Arc::new(ScriptedExec { write_empty: true, ..Default::default() });
        let cutter = Cutter::new(exec, SegmentVerifier::size_only(), CutPolicy::new(1.0));

        let entry = SegmentPlanEntry::new(0, 0.0, 30.0);
        let err = cutter
            .cut(&source(vec![0.0]), &entry, &ws, CutMode::StreamCopy, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::Cut { index: 0, .. }));
        assert!(!ws.join("clip_001.mp4").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let root = TempDir::new().unwrap();
        let ws = WorkspaceManager::new(root.path()).acquire(JobId::new()).unwrap();
        let exec = Arc::new(ScriptedExec::default());
        let cutter = Cutter::new(exec.clone(), SegmentVerifier::size_only(), CutPolicy::new(1.0));
        let token = CancellationToken::new();
        token.cancel();

        let entry = SegmentPlanEntry::new(0, 0.0, 30.0);
        let err = cutter
            .cut(&source(vec![]), &entry, &ws, CutMode::StreamCopy, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(exec.seen.lock().is_empty());
    }
}
