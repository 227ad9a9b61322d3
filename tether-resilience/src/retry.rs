//! Retry policy and coordinator

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::backoff::ExponentialBackoff;
use crate::classify::{classify, Classify, ErrorClassification};
use tether_config::RetryConfig;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of resubmissions after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that never resubmits
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay before a specific retry (1-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        ExponentialBackoff::new(self.base_delay, self.max_delay, self.jitter).delay_for(retry)
    }
}

/// Why a call stopped without succeeding
///
/// Every variant carries the last observed error untouched.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The server rejected the credential; never retried
    #[error("Authentication failed: {0}")]
    AuthFailure(E),

    /// A client-side fault, or a failure the classifier refused to retry
    #[error("Non-retryable error: {0}")]
    NonRetryable(E),

    /// Transient failures persisted through every retry
    #[error("Gave up after {retries} retries. Last error: {last_error}")]
    Exhausted { retries: u32, last_error: E },
}

impl<E> RetryError<E> {
    /// Discard retry metadata and return the original error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::AuthFailure(error) => error,
            RetryError::NonRetryable(error) => error,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Borrow the original error
    pub fn inner(&self) -> &E {
        match self {
            RetryError::AuthFailure(error) => error,
            RetryError::NonRetryable(error) => error,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RetryError::AuthFailure(_))
    }
}

/// Drives one call through its attempts
///
/// The coordinator owns the retry counter. Each attempt is produced fresh by
/// the caller's closure from the retry count, so nothing is shared between
/// attempts other than what the closure captures immutably.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
}

impl RetryCoordinator {
    /// Create a new coordinator with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Create with default policy
    pub fn with_default_policy() -> Self {
        Self::new(RetryPolicy::default())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt` until it succeeds or reaches a terminal classification
    ///
    /// The closure receives the current retry count (0 for the first attempt).
    pub async fn execute<F, Fut, T, E>(&self, mut attempt: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut retry_count = 0;

        loop {
            debug!(
                "Executing attempt {} (retry {} of {})",
                retry_count + 1,
                retry_count,
                self.policy.max_retries
            );

            let error = match attempt(retry_count).await {
                Ok(result) => {
                    if retry_count > 0 {
                        info!("Call succeeded after {} retries", retry_count);
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let outcome = error.failure_outcome();
            match classify(outcome, retry_count, self.policy.max_retries) {
                ErrorClassification::AuthFailure => {
                    warn!("Call rejected as unauthenticated: {}", error);
                    return Err(RetryError::AuthFailure(error));
                }
                ErrorClassification::NonRetryable => {
                    if outcome.is_transient() {
                        warn!("Call failed after {} retries: {}", retry_count, error);
                        return Err(RetryError::Exhausted {
                            retries: retry_count,
                            last_error: error,
                        });
                    }
                    warn!("Call failed with non-retryable error: {}", error);
                    return Err(RetryError::NonRetryable(error));
                }
                classification @ (ErrorClassification::NetworkOrTimeout
                | ErrorClassification::ServerError) => {
                    retry_count += 1;
                    let delay = self.policy.delay_for_retry(retry_count);
                    warn!(
                        "Attempt failed ({}): {}. Retry {} of {} in {:?}",
                        classification, error, retry_count, self.policy.max_retries, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
