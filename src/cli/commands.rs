//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::toml_config::AppConfig;
use crate::adapters::{ConsoleTransport, DirectoryTransport, FFprobeAdapter, ToolCommand};
use crate::app::AppContainer;
use crate::cli::args::{PlanArgs, ProbeArgs, ServeArgs, SplitArgs};
use crate::domain::model::{FileRef, Job, JobId, PlanOutcome, SessionState, UserId};
use crate::domain::rules::parse_segment_length;
use crate::planner;
use crate::ports::InboundEvent;
use crate::probe::MediaProber;
use crate::session::start_sweeper;
use crate::utils::Utils;

/// Execute the split command
pub async fn split(config: &AppConfig, args: SplitArgs) -> Result<()> {
    let length = parse_segment_length(&args.length, config.limits.max_segment_seconds)
        .with_context(|| format!("Invalid clip length '{}'", args.length))?;
    let meta = std::fs::metadata(&args.input)
        .with_context(|| format!("Input file does not exist: {}", args.input.display()))?;
    if !meta.is_file() {
        bail!("Input is not a file: {}", args.input.display());
    }

    info!("Input: {}", args.input.display());
    info!("Clip length: {}s", length);
    info!("Output directory: {}", args.out_dir.display());

    // Local runs are only bounded by an explicit upload limit
    let mut config = config.clone();
    if config.limits.max_upload_bytes.is_none() {
        config.limits.max_upload_bytes = Some(u64::MAX);
    }

    let transport = DirectoryTransport::new(&args.out_dir, ConsoleTransport::stdout()).flat();
    let container = AppContainer::from_config(&config, transport)?;

    let job = Job::new(
        JobId::new(),
        UserId::from("cli"),
        FileRef::new(&args.input, meta.len()),
        length,
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        })
    };

    let report = container.runner().run(job, cancel).await;
    interrupt.abort();

    match report.state {
        SessionState::Done if report.failed_deliveries().is_empty() => Ok(()),
        SessionState::Done => bail!(
            "{} of {} clips could not be written",
            report.failed_deliveries().len(),
            report.deliveries.len()
        ),
        SessionState::Cancelled => bail!("Split cancelled"),
        _ => bail!(
            "Split failed: {}",
            report.failure.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Execute the probe command
pub async fn probe(config: &AppConfig, args: ProbeArgs) -> Result<()> {
    let ffprobe = config.tools.resolve_ffprobe()?;
    let prober = MediaProber::new(Arc::new(FFprobeAdapter::new(ffprobe, config.timeouts.probe())));
    let report = prober
        .probe(&args.input, &CancellationToken::new())
        .await
        .context("Failed to probe input file")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File:      {}", args.input.display());
    println!("Duration:  {} ({:.3}s)", Utils::format_clock(report.duration), report.duration);
    println!("Codec:     {}", report.codec);
    let details = &report.details;
    if let (Some(w), Some(h)) = (details.width, details.height) {
        println!("Size:      {}x{}", w, h);
    }
    if let Some(fps) = details.fps {
        println!("Frame rate: {:.3} fps", fps);
    }
    if let Some(bps) = details.bit_rate {
        println!("Bit rate:  {}", Utils::format_bit_rate(bps));
    }
    if let Some(size) = details.size_bytes {
        println!("File size: {}", Utils::format_file_size(size));
    }
    println!("Keyframes: {}", report.keyframes.len());
    Ok(())
}

/// Execute the plan command
pub fn plan(config: &AppConfig, args: PlanArgs) -> Result<()> {
    let length = parse_segment_length(&args.length, config.limits.max_segment_seconds)
        .with_context(|| format!("Invalid clip length '{}'", args.length))?;
    let outcome = planner::plan(args.duration, f64::from(length))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        PlanOutcome::WholeFile { .. } => {
            println!("Whole file: {:.3}s fits in one {}s clip", args.duration, length)
        }
        PlanOutcome::Split { plan } => {
            println!("{} clips of {}s from {:.3}s", plan.len(), length, args.duration)
        }
    }
    for entry in outcome.entries() {
        println!(
            "clip {:03}  {:>10.3} -> {:>10.3}  ({:.3}s)",
            entry.number(),
            entry.start,
            entry.end,
            entry.duration
        );
    }
    Ok(())
}

/// Execute the serve command
pub async fn serve(config: &AppConfig, args: ServeArgs) -> Result<()> {
    let container = AppContainer::from_config(config, ConsoleTransport::stdout())?;
    let shutdown = CancellationToken::new();

    let sweeper = start_sweeper(
        container.sessions().clone(),
        config.timeouts.sweep_interval(),
        config.timeouts.session_idle(),
        shutdown.clone(),
    );
    let orchestrator = Arc::new(container.orchestrator(shutdown.clone()));
    let (tx, rx) = mpsc::channel(64);
    let event_loop = tokio::spawn(orchestrator.run(rx));

    info!("Console session ready; type /start as {}", args.user);
    let default_user = UserId::new(args.user);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling running jobs");
                shutdown.cancel();
                break;
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let Some(input) = parse_console_line(&line, &default_user) else {
            continue;
        };
        let event = match input.into_event() {
            Ok(event) => event,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }

    drop(tx);
    let reports = event_loop.await.context("Event loop panicked")?;
    info!("Session ended after {} jobs", reports.len());

    shutdown.cancel();
    sweeper.await.context("Sweeper panicked")?;
    Ok(())
}

/// Execute the check-tools command
pub async fn check_tools(config: &AppConfig) -> Result<()> {
    let tools = [
        ("ffprobe", config.tools.resolve_ffprobe()),
        ("ffmpeg", config.tools.resolve_ffmpeg()),
    ];

    for (name, resolved) in tools {
        let path = resolved?;
        let mut cmd = ToolCommand::new(&path);
        cmd.arg("-version").timeout(Duration::from_secs(10));
        let output = cmd
            .execute(&CancellationToken::new())
            .await
            .with_context(|| format!("{} did not run", path.display()))?;
        let version = output.stdout.lines().next().unwrap_or_default().trim().to_string();
        println!("{:<8} {} ({})", name, path.display(), version);
    }
    Ok(())
}

/// One parsed console line
#[derive(Debug, PartialEq)]
struct ConsoleInput {
    user: UserId,
    kind: ConsoleKind,
}

#[derive(Debug, PartialEq)]
enum ConsoleKind {
    Upload(PathBuf),
    Text(String),
}

impl ConsoleInput {
    fn into_event(self) -> Result<InboundEvent> {
        match self.kind {
            ConsoleKind::Text(text) => Ok(InboundEvent::Text { user: self.user, text }),
            ConsoleKind::Upload(path) => {
                let meta = std::fs::metadata(&path)
                    .with_context(|| format!("Cannot upload {}", path.display()))?;
                Ok(InboundEvent::File {
                    user: self.user,
                    file: FileRef::new(path, meta.len()),
                })
            }
        }
    }
}

/// Parse `[@user] (/upload <path> | <text>)`; blank lines yield nothing.
fn parse_console_line(line: &str, default_user: &UserId) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (user, rest) = match line.strip_prefix('@') {
        Some(tagged) => {
            let (id, rest) = tagged.split_once(char::is_whitespace).unwrap_or((tagged, ""));
            if id.is_empty() {
                return None;
            }
            (UserId::new(id), rest.trim())
        }
        None => (default_user.clone(), line),
    };
    if rest.is_empty() {
        return None;
    }

    let kind = match rest.strip_prefix("/upload") {
        Some(path) if path.starts_with(char::is_whitespace) => {
            ConsoleKind::Upload(PathBuf::from(path.trim()))
        }
        _ => ConsoleKind::Text(rest.to_string()),
    };
    Some(ConsoleInput { user, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_line() {
        let me = UserId::from("me");

        assert_eq!(parse_console_line("   ", &me), None);
        assert_eq!(
            parse_console_line("30", &me),
            Some(ConsoleInput {
                user: me.clone(),
                kind: ConsoleKind::Text("30".into())
            })
        );
        assert_eq!(
            parse_console_line("@bob /upload /tmp/a b.mp4", &me),
            Some(ConsoleInput {
                user: UserId::from("bob"),
                kind: ConsoleKind::Upload(PathBuf::from("/tmp/a b.mp4"))
            })
        );
        assert_eq!(parse_console_line("@bob", &me), None);
    }

    #[test]
    fn test_upload_prefix_needs_a_path() {
        let me = UserId::from("me");
        let parsed = parse_console_line("/uploads", &me).unwrap();
        assert_eq!(parsed.kind, ConsoleKind::Text("/uploads".into()));
    }

    #[test]
    fn test_upload_of_missing_file_is_an_error() {
        let input = ConsoleInput {
            user: UserId::from("me"),
            kind: ConsoleKind::Upload(PathBuf::from("/definitely/not/here.mp4")),
        };
        assert!(input.into_event().is_err());
    }
}
