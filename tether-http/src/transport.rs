//! Wire transport for request attempts

use async_trait::async_trait;
use reqwest::Client;
use bytes::Bytes;
use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::types::{ApiResponse, RequestAttempt, RequestBody};

/// Sends one attempt and reads the whole response
///
/// Any status code is a successful transmission; deciding what a status
/// means is the client's job. Errors are reserved for attempts where no
/// response arrived or the request could not be built.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, attempt: &RequestAttempt) -> Result<ApiResponse, ApiError>;
}

/// Production transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    api_root: String,
}

impl ReqwestTransport {
    /// Build the underlying client from configuration
    ///
    /// The per-attempt timeout is not set here; the API client enforces it
    /// around each attempt so it also covers reading the body.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        debug!(api_root = %config.api_root, "Creating reqwest transport");

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .pool_max_idle_per_host(config.connection_pool.max_idle_per_host)
            .pool_idle_timeout(config.connection_pool.idle_timeout)
            .connect_timeout(config.connection_pool.connection_timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_root: config.api_root.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for a path relative to the API root
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, attempt: &RequestAttempt) -> Result<ApiResponse, ApiError> {
        let descriptor = attempt.descriptor();
        let url = self.url_for(descriptor.path());

        debug!(
            method = %descriptor.method(),
            url = %url,
            retry = attempt.retry_count(),
            "Sending request"
        );

        let mut request = self
            .client
            .request(descriptor.method().into(), &url)
            .headers(descriptor.outgoing_headers());

        if !descriptor.query().is_empty() {
            request = request.query(descriptor.query());
        }

        request = match descriptor.body() {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.body(serde_json::to_vec(value)?),
            RequestBody::Text(text) => request.body(text.clone()),
            RequestBody::Bytes(bytes) => request.body(bytes.clone()),
        };

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        // The body shares the attempt deadline so a stalled body still
        // reports the status that already arrived
        let read = match attempt.deadline() {
            Some(deadline) => match timeout_at(deadline, response.bytes()).await {
                Ok(read) => read.map_err(BodyError::from),
                Err(_) => Err(BodyError::TimedOut),
            },
            None => response.bytes().await.map_err(BodyError::from),
        };

        let body = match read {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                warn!(status = status.as_u16(), error = %e, "Response body incomplete");
                return Err(ApiError::IncompleteBody {
                    status,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Discarding incomplete error body");
                Bytes::new()
            }
        };

        debug!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}

/// Why a response body could not be read after the status arrived
#[derive(Debug, thiserror::Error)]
enum BodyError {
    #[error("body read failed: {0}")]
    Read(#[from] reqwest::Error),

    #[error("body read timed out")]
    TimedOut,
}
