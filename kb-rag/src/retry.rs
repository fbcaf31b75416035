//! Deadline and retry handling for external calls.
//!
//! Every embedding, index and language-model request made by the pipeline
//! runs through a [`CallPolicy`]: each attempt is bounded by a timeout, and
//! transient failures (see [`RagError::is_transient`]) are retried with
//! exponential backoff up to a fixed number of times. Permanent failures are
//! returned immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result, Service};

/// Exponential backoff settings.
///
/// The delay before retry `n` (0-indexed) is
/// `min(initial_backoff_ms * 2^n, max_backoff_ms)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff_ms: 500, max_backoff_ms: 8_000 }
    }
}

impl RetryPolicy {
    /// Create a policy with custom settings.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, initial_backoff_ms: 0, max_backoff_ms: 0 }
    }

    /// Delay to wait before retry number `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

/// Timeout plus retry policy applied to one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    timeout: Duration,
    retry: RetryPolicy,
}

impl CallPolicy {
    /// Create a policy from an explicit timeout and retry policy.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Derive the policy from a pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.request_timeout, config.retry)
    }

    /// The per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The retry settings.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `call` against `service`, enforcing the deadline on each attempt
    /// and retrying transient failures.
    ///
    /// `operation` names the call in log output.
    pub async fn run<F, Fut, T>(&self, service: Service, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RagError::Timeout { service, timeout: self.timeout }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            %service,
                            operation,
                            retries = attempt,
                            "call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        %service,
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        ?backoff,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
