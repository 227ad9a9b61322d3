//! Failure classification
//!
//! [`classify`] is the single source of retry policy. Rules are evaluated in
//! a fixed order so that an authentication failure is recognised before any
//! generic status-range check:
//!
//! | Outcome                                         | Classification     |
//! |-------------------------------------------------|--------------------|
//! | status 401                                      | `AuthFailure`      |
//! | status 400/403/404/409/422, or budget exhausted | `NonRetryable`     |
//! | no response, or timed out                       | `NetworkOrTimeout` |
//! | status >= 500                                   | `ServerError`      |
//! | anything else                                   | `NonRetryable`     |

use std::fmt;

/// Status that terminates the local session
pub const UNAUTHORIZED: u16 = 401;

/// Client-side faults that will not change by resubmitting the request
pub const NON_RETRYABLE_STATUSES: [u16; 5] = [400, 403, 404, 409, 422];

/// Observable shape of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A response arrived with a non-success status code
    Status(u16),

    /// Nothing came back: connection refused/reset, or the attempt timed out
    NoResponse { timed_out: bool },

    /// The request could not be built and never reached the wire
    Local,
}

impl FailureOutcome {
    /// Whether the remote end produced a response
    pub fn has_response(&self) -> bool {
        matches!(self, FailureOutcome::Status(_))
    }

    /// Whether this outcome would be retried if budget remained
    pub fn is_transient(&self) -> bool {
        match self {
            FailureOutcome::Status(status) => *status >= 500,
            FailureOutcome::NoResponse { .. } => true,
            FailureOutcome::Local => false,
        }
    }
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClassification {
    /// Terminal; the caller receives the original error
    NonRetryable,
    /// No response or timeout with retry budget remaining
    NetworkOrTimeout,
    /// 5xx response with retry budget remaining
    ServerError,
    /// 401; terminal and ends the session
    AuthFailure,
}

impl ErrorClassification {
    /// Whether the attempt should be resubmitted after a backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClassification::NetworkOrTimeout | ErrorClassification::ServerError
        )
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClassification::NonRetryable => write!(f, "non-retryable"),
            ErrorClassification::NetworkOrTimeout => write!(f, "network-or-timeout"),
            ErrorClassification::ServerError => write!(f, "server-error"),
            ErrorClassification::AuthFailure => write!(f, "auth-failure"),
        }
    }
}

/// Errors that expose the shape of the failed attempt
pub trait Classify {
    fn failure_outcome(&self) -> FailureOutcome;
}

/// Classify a failed attempt against the remaining retry budget
pub fn classify(outcome: FailureOutcome, retry_count: u32, max_retries: u32) -> ErrorClassification {
    if outcome == FailureOutcome::Status(UNAUTHORIZED) {
        return ErrorClassification::AuthFailure;
    }

    let listed = matches!(outcome, FailureOutcome::Status(status) if NON_RETRYABLE_STATUSES.contains(&status));
    if listed || retry_count >= max_retries {
        return ErrorClassification::NonRetryable;
    }

    match outcome {
        FailureOutcome::NoResponse { .. } => ErrorClassification::NetworkOrTimeout,
        FailureOutcome::Status(status) if status >= 500 => ErrorClassification::ServerError,
        _ => ErrorClassification::NonRetryable,
    }
}
