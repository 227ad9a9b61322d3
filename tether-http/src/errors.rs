//! API client error types

use bytes::Bytes;
use reqwest::StatusCode;
use tether_resilience::{Classify, FailureOutcome};

use crate::types::HttpMethod;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for API calls
///
/// Callers receive the error of the last attempt exactly as it was observed;
/// retry bookkeeping never leaks into this type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} {path} failed with status {status}")]
    Status {
        method: HttpMethod,
        path: String,
        status: StatusCode,
        body: Bytes,
    },

    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    /// A success status arrived but its body could not be read in full
    #[error("Response body incomplete after status {status}: {source}")]
    IncompleteBody {
        status: StatusCode,
        #[source]
        source: BoxError,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid value for header: {0}")]
    InvalidHeaderValue(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// Status code of the response, if one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } | ApiError::IncompleteBody { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Response body as text, if a response was received
    pub fn body_text(&self) -> Option<String> {
        match self {
            ApiError::Status { body, .. } => Some(String::from_utf8_lossy(body).into_owned()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }

    /// Wrap any transport failure where nothing came back
    pub fn network(error: impl Into<BoxError>) -> Self {
        ApiError::Network(error.into())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ApiError::Timeout
        } else if error.is_builder() {
            ApiError::InvalidRequest(error.to_string())
        } else {
            ApiError::Network(Box::new(error))
        }
    }
}

impl Classify for ApiError {
    fn failure_outcome(&self) -> FailureOutcome {
        match self {
            ApiError::Status { status, .. } | ApiError::IncompleteBody { status, .. } => {
                FailureOutcome::Status(status.as_u16())
            }
            ApiError::Network(_) => FailureOutcome::NoResponse { timed_out: false },
            ApiError::Timeout => FailureOutcome::NoResponse { timed_out: true },
            ApiError::InvalidRequest(_)
            | ApiError::InvalidHeaderName(_)
            | ApiError::InvalidHeaderValue(_)
            | ApiError::InvalidJson(_)
            | ApiError::ConfigError(_) => FailureOutcome::Local,
        }
    }
}
