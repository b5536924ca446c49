//! FFmpeg execution adapter
//!
//! Translates a [`CutInvocation`] into an ffmpeg command line and runs it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::adapters::tool_command::ToolCommand;
use crate::domain::model::CutMode;
use crate::error::SplitResult;
use crate::ports::{CutInvocation, ExecutePort};

/// FFmpeg-based execution adapter
#[derive(Debug, Clone)]
pub struct FFmpegAdapter {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FFmpegAdapter {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    /// Locate ffmpeg on `PATH`.
    pub fn from_path(timeout: Duration) -> Option<Self> {
        which::which("ffmpeg").ok().map(|p| Self::new(p, timeout))
    }

    /// Build the full argument list for one cut.
    pub fn build_args(invocation: &CutInvocation) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-ss".into(),
            format_secs(invocation.start),
            "-i".into(),
            invocation.source.to_string_lossy().into_owned(),
            "-t".into(),
            format_secs(invocation.duration),
        ];

        match invocation.mode {
            CutMode::StreamCopy => {
                args.extend(
                    ["-map", "0", "-c", "copy", "-avoid_negative_ts", "make_zero"]
                        .iter()
                        .map(|s| s.to_string()),
                );
            }
            CutMode::ReEncode => {
                let encode = &invocation.encode;
                args.extend(
                    ["-map", "0:v:0?", "-map", "0:a?", "-c:v", "libx264", "-preset"]
                        .iter()
                        .map(|s| s.to_string()),
                );
                args.push(encode.preset.clone());
                match encode.video_bit_rate {
                    Some(bps) => {
                        args.push("-b:v".into());
                        args.push(bps.to_string());
                    }
                    None => {
                        args.push("-crf".into());
                        args.push(encode.crf.to_string());
                    }
                }
                args.push("-c:a".into());
                args.push(encode.audio_codec.clone());
                args.push("-movflags".into());
                args.push("+faststart".into());
            }
        }

        args.push(invocation.output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl ExecutePort for FFmpegAdapter {
    async fn execute_cut(
        &self,
        invocation: &CutInvocation,
        cancel: &CancellationToken,
    ) -> SplitResult<()> {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(self.timeout).args(Self::build_args(invocation));
        cmd.execute(cancel).await?;
        Ok(())
    }
}

/// Seconds with millisecond precision, as ffmpeg accepts them.
fn format_secs(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
