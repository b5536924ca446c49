//! Retry decorator for outbound transports

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::model::UserId;
use crate::error::{SplitError, SplitResult};
use crate::ports::TransportPort;

/// Retries transient transport failures with linear backoff
pub struct RetryingTransport<T> {
    inner: T,
    attempts: u32,
    backoff: Duration,
}

impl<T: TransportPort> RetryingTransport<T> {
    pub fn new(inner: T, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    async fn pause(&self, attempt: u32) {
        if !self.backoff.is_zero() {
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}

fn is_transient(err: &SplitError) -> bool {
    matches!(err, SplitError::Transport(_) | SplitError::Io(_))
}

#[async_trait]
impl<T: TransportPort> TransportPort for RetryingTransport<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn send_text(&self, user: &UserId, text: &str) -> SplitResult<()> {
        let mut attempt = 1;
        loop {
            match self.inner.send_text(user, text).await {
                Err(e) if is_transient(&e) && attempt < self.attempts => {
                    warn!("send_text to {} failed (attempt {}): {}", user, attempt, e);
                    self.pause(attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_file(&self, user: &UserId, path: &Path, caption: &str) -> SplitResult<()> {
        let mut attempt = 1;
        loop {
            match self.inner.send_file(user, path, caption).await {
                Err(e) if is_transient(&e) && attempt < self.attempts => {
                    warn!(
                        "send_file {} to {} failed (attempt {}): {}",
                        path.display(),
                        user,
                        attempt,
                        e
                    );
                    self.pause(attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
