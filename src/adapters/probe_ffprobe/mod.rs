//! FFprobe adapter for media file probing
//!
//! Shells out to `ffprobe` twice: once for container and stream metadata as
//! JSON, once for keyframe timestamps of the first video stream.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapters::tool_command::ToolCommand;
use crate::domain::model::{MediaDetails, ProbeReport};
use crate::error::{SplitError, SplitResult};
use crate::ports::ProbePort;

/// FFprobe-based probe adapter
#[derive(Debug, Clone)]
pub struct FFprobeAdapter {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FFprobeAdapter {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    /// Locate ffprobe on `PATH`.
    pub fn from_path(timeout: Duration) -> Option<Self> {
        which::which("ffprobe").ok().map(|p| Self::new(p, timeout))
    }

    fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd
    }

    async fn metadata(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> SplitResult<FfprobeOutput> {
        let mut cmd = self.command();
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute(cancel).await.map_err(|e| probe_error(path, e))?;
        serde_json::from_str(&output.stdout).map_err(|e| SplitError::Probe {
            path: path.display().to_string(),
            message: format!("unreadable ffprobe output: {e}"),
        })
    }

    async fn keyframes(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<Vec<f64>> {
        let mut cmd = self.command();
        cmd.args([
            "-v", "error",
            "-select_streams", "v:0",
            "-skip_frame", "nokey",
            "-show_entries", "frame=pts_time",
            "-of", "csv=p=0",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute(cancel).await.map_err(|e| probe_error(path, e))?;
        Ok(parse_keyframe_lines(&output.stdout))
    }
}

#[async_trait]
impl ProbePort for FFprobeAdapter {
    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<ProbeReport> {
        let meta = self.metadata(path, cancel).await?;
        let has_video = meta.streams.iter().any(FfprobeStream::is_video);
        let keyframes = if has_video {
            self.keyframes(path, cancel).await?
        } else {
            Vec::new()
        };
        debug!("{} keyframes in {}", keyframes.len(), path.display());
        report_from_output(path, meta, keyframes)
    }

    async fn probe_duration(&self, path: &Path, cancel: &CancellationToken) -> SplitResult<f64> {
        let mut cmd = self.command();
        cmd.args([
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute(cancel).await.map_err(|e| probe_error(path, e))?;
        parse_seconds(output.stdout.trim()).ok_or_else(|| SplitError::Probe {
            path: path.display().to_string(),
            message: format!("unreadable duration '{}'", output.stdout.trim()),
        })
    }
}

/// Tool failures become probe errors; cancellation and timeouts pass through.
fn probe_error(path: &Path, err: SplitError) -> SplitError {
    match err {
        SplitError::Tool { message, .. } => SplitError::Probe {
            path: path.display().to_string(),
            message,
        },
        other => other,
    }
}

// JSON structures

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

impl FfprobeStream {
    fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }
}

fn report_from_output(
    path: &Path,
    out: FfprobeOutput,
    keyframes: Vec<f64>,
) -> SplitResult<ProbeReport> {
    let video = out.streams.iter().find(|s| s.is_video());
    let primary = video.or_else(|| out.streams.first());

    let duration = out
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds)
        .or_else(|| primary.and_then(|s| s.duration.as_deref()).and_then(parse_seconds))
        .ok_or_else(|| SplitError::Probe {
            path: path.display().to_string(),
            message: "no readable duration".to_string(),
        })?;

    let codec = primary
        .and_then(|s| s.codec_name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let details = MediaDetails {
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        fps: video.and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_rational)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rational))
        }),
        bit_rate: video
            .and_then(|s| s.bit_rate.as_deref())
            .or_else(|| out.format.as_ref().and_then(|f| f.bit_rate.as_deref()))
            .and_then(|b| b.parse().ok()),
        size_bytes: out
            .format
            .as_ref()
            .and_then(|f| f.size.as_deref())
            .and_then(|s| s.parse().ok()),
    };

    Ok(ProbeReport {
        duration,
        keyframes,
        codec,
        details,
    })
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an ffprobe rational like `30000/1001`.
fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num == 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_keyframe_lines(stdout: &str) -> Vec<f64> {
    stdout
        .lines()
        .filter_map(|line| line.split(',').next())
        .filter_map(parse_seconds)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "avg_frame_rate": "30000/1001", "r_frame_rate": "30/1", "bit_rate": "4000000"},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"duration": "125.400000", "size": "62700000", "bit_rate": "4128000"}
    }"#;

    #[test]
    fn test_report_from_sample() {
        let out: FfprobeOutput = serde_json::from_str(SAMPLE).unwrap();
        let report = report_from_output(Path::new("in.mp4"), out, vec![0.0, 2.0]).unwrap();
        assert_eq!(report.duration, 125.4);
        assert_eq!(report.codec, "h264");
        assert_eq!(report.details.width, Some(1920));
        assert_eq!(report.details.bit_rate, Some(4_000_000));
        assert_eq!(report.details.size_bytes, Some(62_700_000));
        assert!((report.details.fps.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_missing_duration_is_probe_error() {
        let out: FfprobeOutput =
            serde_json::from_str(r#"{"streams": [], "format": {"duration": "N/A"}}"#).unwrap();
        let err = report_from_output(Path::new("in.mp4"), out, Vec::new()).unwrap_err();
        assert!(matches!(err, SplitError::Probe { .. }));
    }

    #[test]
    fn test_keyframe_lines() {
        let stdout = "0.000000\n2.002000,\nN/A\n\n4.004000\n";
        assert_eq!(parse_keyframe_lines(stdout), vec![0.0, 2.002, 4.004]);
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("25/1"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }
}
