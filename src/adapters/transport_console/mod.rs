//! Console transport: user-facing messages as plain lines on a writer

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::model::UserId;
use crate::error::{SplitError, SplitResult};
use crate::ports::TransportPort;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes `[user] message` lines; stdout by default
#[derive(Clone)]
pub struct ConsoleTransport {
    out: SharedWriter,
}

impl ConsoleTransport {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(writer)),
        }
    }

    fn write_line(&self, user: &UserId, body: &str) -> SplitResult<()> {
        let mut out = self.out.lock();
        for line in body.lines() {
            writeln!(out, "[{}] {}", user, line)
                .map_err(|e| SplitError::Transport(format!("console write failed: {e}")))?;
        }
        out.flush()
            .map_err(|e| SplitError::Transport(format!("console flush failed: {e}")))
    }
}

#[async_trait]
impl TransportPort for ConsoleTransport {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send_text(&self, user: &UserId, text: &str) -> SplitResult<()> {
        self.write_line(user, text)
    }

    async fn send_file(&self, user: &UserId, path: &Path, caption: &str) -> SplitResult<()> {
        self.write_line(user, &format!("{} -> {}", caption, path.display()))
    }
}
