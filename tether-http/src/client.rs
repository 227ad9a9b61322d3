//! Resilient API client

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tether_reachability::{ReachabilityListener, ReachabilitySignal, Subscription};
use tether_resilience::{Classify, FailureOutcome, RetryCoordinator, RetryError};
use tracing::{debug, info};

use crate::auth::{AuthInjector, InMemorySession, SessionStore};
use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::session::{SessionExpiredHandler, SessionGuard};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ApiResponse, RequestAttempt, RequestDescriptor};

/// Shared client for every call the dashboard makes to the inventory API
///
/// Each call runs as:
/// 1. attach the bearer credential (once per call)
/// 2. send the attempt with the per-attempt timeout
/// 3. record reachability from the outcome: any response means reachable,
///    no response means unreachable
/// 4. classify failures; a 401 ends the session without retrying, transient
///    failures are resubmitted after backoff, everything else is returned
///
/// Callers only ever see a success or the final error of the last attempt.
#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    auth: AuthInjector,
    session_guard: SessionGuard,
    session: Arc<dyn SessionStore>,
    reachability: Arc<ReachabilitySignal>,
    retry: RetryCoordinator,
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Run a call through authentication, transport and retry handling
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let descriptor = Arc::new(self.auth.inject(descriptor)?);
        let timeout = descriptor.timeout().unwrap_or(self.config.timeout);

        let result = self
            .retry
            .execute(|retry_count| {
                let descriptor = descriptor.clone();
                async move {
                    let deadline = Instant::now() + timeout;
                    let attempt =
                        RequestAttempt::new(descriptor, retry_count).with_deadline(deadline);
                    self.send_attempt(&attempt, timeout).await
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(RetryError::AuthFailure(error)) => {
                self.session_guard.session_expired();
                Err(error)
            }
            Err(error) => Err(error.into_inner()),
        }
    }

    async fn send_attempt(
        &self,
        attempt: &RequestAttempt,
        timeout: Duration,
    ) -> Result<ApiResponse, ApiError> {
        let descriptor = attempt.descriptor();
        let deadline = attempt
            .deadline()
            .unwrap_or_else(|| Instant::now() + timeout);
        let sent = tokio::time::timeout_at(deadline, self.transport.send(attempt)).await;

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                self.observe_failure(&error);
                return Err(error);
            }
            Err(_) => {
                debug!(
                    method = %descriptor.method(),
                    path = descriptor.path(),
                    ?timeout,
                    "Attempt timed out"
                );
                let error = ApiError::Timeout;
                self.observe_failure(&error);
                return Err(error);
            }
        };

        self.reachability.set_reachable(true);

        let status = response.status();
        if status.is_success() {
            debug!(
                method = %descriptor.method(),
                path = descriptor.path(),
                status = status.as_u16(),
                "Call succeeded"
            );
            return Ok(response);
        }

        Err(ApiError::Status {
            method: descriptor.method(),
            path: descriptor.path().to_string(),
            status,
            body: response.into_body(),
        })
    }

    fn observe_failure(&self, error: &ApiError) {
        match error.failure_outcome() {
            FailureOutcome::Status(_) => {
                self.reachability.set_reachable(true);
            }
            FailureOutcome::NoResponse { .. } => {
                self.reachability.set_reachable(false);
            }
            // Local build failures say nothing about the backend
            FailureOutcome::Local => {}
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(RequestDescriptor::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(RequestDescriptor::delete(path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(RequestDescriptor::post(path).with_json(body)?)
            .await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(RequestDescriptor::put(path).with_json(body)?)
            .await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(RequestDescriptor::patch(path).with_json(body)?)
            .await
    }

    /// Whether the backend was reachable at the last observation
    pub fn is_online(&self) -> bool {
        self.reachability.is_reachable()
    }

    /// Subscribe to reachability transitions
    pub fn on_connection_change<L>(&self, listener: L) -> Subscription
    where
        L: ReachabilityListener + 'static,
    {
        self.reachability.subscribe(listener)
    }

    pub fn reachability(&self) -> &Arc<ReachabilitySignal> {
        &self.reachability
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// Builder wiring the client's collaborators
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    session: Option<Arc<dyn SessionStore>>,
    reachability: Option<Arc<ReachabilitySignal>>,
    on_session_expired: Option<Arc<dyn SessionExpiredHandler>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            session: None,
            reachability: None,
            on_session_expired: None,
        }
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Share the application's reachability signal
    pub fn reachability(mut self, reachability: Arc<ReachabilitySignal>) -> Self {
        self.reachability = Some(reachability);
        self
    }

    pub fn on_session_expired<H>(mut self, handler: H) -> Self
    where
        H: SessionExpiredHandler + 'static,
    {
        self.on_session_expired = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(InMemorySession::new()) as Arc<dyn SessionStore>);
        let reachability = self.reachability.unwrap_or_default();

        info!(
            api_root = %self.config.api_root,
            timeout = ?self.config.timeout,
            max_retries = self.config.retry.max_retries,
            "API client ready"
        );

        Ok(ApiClient {
            retry: RetryCoordinator::new(self.config.retry.clone()),
            auth: AuthInjector::new(session.clone()),
            session_guard: SessionGuard::new(session.clone(), self.on_session_expired),
            session,
            reachability,
            transport,
            config: self.config,
        })
    }
}
