//! Resilience patterns for Tether
//!
//! This crate provides the retry policy for outbound API calls: a pure
//! failure classifier, exponential backoff, and a retry coordinator that
//! resubmits transiently failing attempts.

pub mod backoff;
pub mod classify;
pub mod retry;

// Re-export commonly used types
pub use backoff::ExponentialBackoff;
pub use classify::{classify, Classify, ErrorClassification, FailureOutcome, NON_RETRYABLE_STATUSES};
pub use retry::{RetryCoordinator, RetryError, RetryPolicy};
