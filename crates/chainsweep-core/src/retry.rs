//! Fixed-delay retry for fallible remote calls.

use std::future::Future;
use std::time::Duration;

use crate::error::SweepError;
use crate::shutdown::ShutdownSignal;

/// Configuration for [`Retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, counting the first try. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1_000),
        }
    }
}

/// Re-invokes an operation until it succeeds or attempts run out.
///
/// The whole operation is re-run on each attempt, so an operation that
/// picks an endpoint from a pool picks again.
#[derive(Clone)]
pub struct Retry {
    config: RetryConfig,
    shutdown: ShutdownSignal,
}

impl Retry {
    pub fn new(config: RetryConfig, shutdown: ShutdownSignal) -> Self {
        Self { config, shutdown }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` with retries. Returns the last error once attempts are
    /// exhausted, or [`SweepError::Cancelled`] if shutdown fires mid-sleep.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, SweepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SweepError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(operation, attempt, error = %e, "max attempts exceeded");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = self.config.delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            tracing::debug!(operation, "retry sleep interrupted by shutdown");
                            return Err(SweepError::Cancelled);
                        }
                        _ = tokio::time::sleep(self.config.delay) => {}
                    }
                }
            }
        }
    }
}
