//! Subprocess runner for the external media tools
//!
//! Every invocation is bounded by a timeout and a cancellation token. When
//! either fires first, the pending child future is dropped and the child is
//! killed (`kill_on_drop`), so no orphaned process outlives its job.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SplitError, SplitResult};

/// Default invocation timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of stderr bytes kept in error messages
const STDERR_TAIL: usize = 600;

/// Output captured from a successful tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name for messages
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Run to completion, racing the child against timeout and cancellation.
    ///
    /// # Errors
    ///
    /// - [`SplitError::Cancelled`] if `cancel` fires first; the child is killed.
    /// - [`SplitError::Timeout`] if the deadline passes; the child is killed.
    /// - [`SplitError::Tool`] on spawn failure or non-zero exit (with the tail of stderr).
    pub async fn execute(&self, cancel: &CancellationToken) -> SplitResult<ToolOutput> {
        let tool = self.tool_name();

        if cancel.is_cancelled() {
            return Err(SplitError::Cancelled);
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} {}", tool, self.args.join(" "));

        let child = cmd.spawn().map_err(|e| SplitError::Tool {
            tool: tool.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("{} cancelled, killing child", tool);
                return Err(SplitError::Cancelled);
            }
            _ = tokio::time::sleep(self.timeout) => {
                debug!("{} exceeded {:?}, killing child", tool, self.timeout);
                return Err(SplitError::Timeout { tool: tool.clone(), after: self.timeout });
            }
            result = child.wait_with_output() => result.map_err(|e| SplitError::Tool {
                tool: tool.clone(),
                message: format!("failed to wait: {e}"),
            })?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SplitError::Tool {
                tool,
                message: format!("exited with {}: {}", output.status, stderr_tail(&stderr)),
            });
        }

        Ok(ToolOutput {
            status: output.status,
            stdout,
            stderr,
        })
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed;
    }
    let mut cut = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(cut) {
        cut += 1;
    }
    &trimmed[cut..]
}
