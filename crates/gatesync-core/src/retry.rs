//! Rate-limit-aware request execution
//!
//! Every remote store call goes through [`execute_with_retry`]. The retry
//! decision is an explicit, synchronous function on [`RetryPolicy`] so the
//! policy is testable without network calls: errors are values, never
//! control-flow exceptions.
//!
//! Two kinds of failure are distinguished:
//!
//! - transient errors (transport failures, non-success statuses) are retried
//!   after a fixed backoff;
//! - a provider-enforced rate limit (the configured status code, 429 by
//!   default) is retried after a much longer cooldown.
//!
//! Caller bugs and mid-run invariant violations (capacity exceeded, vanished
//! partition) are never retried. Exhausting the attempt budget surfaces
//! [`Error::RetryExhausted`] carrying the last observed status and body;
//! callers must not retry further.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::time::Duration;
use tracing::warn;

/// Retry policy for remote requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Sleep between attempts after a transient failure
    pub backoff: Duration,
    /// Sleep between attempts after a detected rate limit
    pub rate_limit_cooldown: Duration,
    /// Status code the provider uses to signal rate limiting
    pub rate_limit_status: u16,
}

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after sleeping the given delay
    RetryAfter(Duration),
    /// Surface the error immediately; retrying cannot help
    Fatal,
}

impl RetryPolicy {
    /// Build a policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
            rate_limit_status: config.rate_limit_status,
        }
    }

    /// Classify a failed attempt.
    ///
    /// Rate limiting gets the long cooldown, caller bugs and invariant
    /// violations are fatal, everything else gets the fixed backoff.
    pub fn decide(&self, error: &Error) -> RetryDecision {
        match error {
            Error::RateLimited { .. } => RetryDecision::RetryAfter(self.rate_limit_cooldown),
            Error::Http { status, .. } if *status == self.rate_limit_status => {
                RetryDecision::RetryAfter(self.rate_limit_cooldown)
            }
            Error::CapacityExceeded { .. }
            | Error::PartitionNotFound(_)
            | Error::Invariant(_)
            | Error::Config(_)
            | Error::RetryExhausted { .. } => RetryDecision::Fatal,
            _ => RetryDecision::RetryAfter(self.backoff),
        }
    }
}

/// Drive one store operation to completion under the given policy.
///
/// `attempt` is invoked up to `policy.max_attempts` times. Attempts after
/// the first log a warning with the previous failure. Fatal errors are
/// returned as-is; spending the whole budget returns
/// [`Error::RetryExhausted`].
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;

    for attempt_number in 1..=policy.max_attempts {
        if let Some(previous) = &last_error {
            warn!(
                "Retrying {} (attempt {}/{}) after error: {}",
                operation, attempt_number, policy.max_attempts, previous
            );
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) => match policy.decide(&error) {
                RetryDecision::Fatal => return Err(error),
                RetryDecision::RetryAfter(delay) => {
                    if matches!(error, Error::RateLimited { .. })
                        || error.status() == Some(policy.rate_limit_status)
                    {
                        warn!(
                            "{} was rate limited, cooling down for {:?}",
                            operation, delay
                        );
                    }
                    last_error = Some(error);
                    if attempt_number < policy.max_attempts && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            },
        }
    }

    let (status, body) = match last_error {
        Some(error) => (error.status(), error.to_string()),
        None => (None, "no attempt was made".to_string()),
    };

    Err(Error::RetryExhausted {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
        status,
        body,
    })
}
