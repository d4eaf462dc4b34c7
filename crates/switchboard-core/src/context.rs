//! Per-call deadline and cancellation
//!
//! Every backend operation receives a [`CallContext`]. Adapters wrap their
//! blocking work in [`CallContext::run`] so that an elapsed deadline or a
//! cancelled token surfaces as a `TIMEOUT` error instead of hanging.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{GateError, Result};

#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Instant,
    timeout: Duration,
    token: CancellationToken,
}

impl CallContext {
    pub fn new(timeout: Duration) -> Self {
        Self::with_token(timeout, CancellationToken::new())
    }

    pub fn with_token(timeout: Duration, token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            token,
        }
    }

    /// Same cancellation token, fresh deadline
    ///
    /// Used when a composite step needs a longer budget than the call that
    /// started it.
    pub fn extended(&self, timeout: Duration) -> Self {
        Self::with_token(timeout, self.token.clone())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drive `fut` to completion unless the deadline or cancellation wins
    ///
    /// The future is dropped on timeout, so anything it owns (child
    /// processes spawned with `kill_on_drop`, in-flight HTTP requests) is torn
    /// down with it.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                Err(GateError::timeout(format!("{} was cancelled", operation)))
            }
            _ = tokio::time::sleep_until(self.deadline) => {
                Err(GateError::timeout(format!(
                    "{} timed out after {:?}",
                    operation, self.timeout
                )))
            }
            result = fut => result,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
