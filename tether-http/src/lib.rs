//! Resilient API client for Tether
//!
//! This crate provides the outbound request layer of the inventory
//! dashboard: bearer-token injection, per-attempt timeouts, classified
//! retries with exponential backoff, session termination on 401, and
//! reachability reporting.

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthInjector, InMemorySession, SessionStore};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use errors::ApiError;
pub use session::{SessionExpiredHandler, SessionGuard};
pub use transport::{ReqwestTransport, Transport};
pub use types::{ApiResponse, HttpMethod, HttpMethodError, RequestAttempt, RequestBody, RequestDescriptor};

pub use tether_reachability::{ReachabilitySignal, Subscription};
pub use tether_resilience::{ErrorClassification, RetryPolicy};
