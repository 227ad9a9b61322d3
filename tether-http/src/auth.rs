//! Credential storage and bearer-token injection

use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::debug;

use crate::errors::ApiError;
use crate::types::RequestDescriptor;

/// Holder of the local session: the bearer credential and cached identity
pub trait SessionStore: Send + Sync {
    /// Current bearer credential, if signed in
    fn token(&self) -> Option<String>;

    /// Cached profile of the signed-in user
    fn identity(&self) -> Option<serde_json::Value>;

    /// Store the credential and identity returned by a sign-in
    fn set_session(&self, token: String, identity: Option<serde_json::Value>);

    /// Forget the credential and any cached identity
    fn clear(&self);
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<serde_json::Value>,
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemorySession {
    state: RwLock<SessionState>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a credential
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_session(token.into(), None);
        session
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().token.is_some()
    }
}

impl SessionStore for InMemorySession {
    fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    fn identity(&self) -> Option<serde_json::Value> {
        self.state.read().identity.clone()
    }

    fn set_session(&self, token: String, identity: Option<serde_json::Value>) {
        let mut state = self.state.write();
        state.token = Some(token);
        state.identity = identity;
    }

    fn clear(&self) {
        let mut state = self.state.write();
        state.token = None;
        state.identity = None;
    }
}

/// Attaches `Authorization: Bearer <credential>` to outgoing requests
#[derive(Clone)]
pub struct AuthInjector {
    session: Arc<dyn SessionStore>,
}

impl AuthInjector {
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self { session }
    }

    /// Attach the current credential, if any
    ///
    /// Without a credential the request goes out unauthenticated; the server
    /// decides whether that is acceptable.
    pub fn inject(&self, mut descriptor: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        let Some(token) = self.session.token() else {
            debug!(path = descriptor.path(), "No credential, sending unauthenticated");
            return Ok(descriptor);
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidHeaderValue(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);
        descriptor.insert_header(AUTHORIZATION, value);

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injects_bearer_token() {
        let session = Arc::new(InMemorySession::with_token("abc123"));
        let injector = AuthInjector::new(session);

        let descriptor = injector.inject(RequestDescriptor::get("/servers")).unwrap();
        assert_eq!(descriptor.headers()[AUTHORIZATION], "Bearer abc123");
        assert!(descriptor.headers()[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_forwards_unmodified_without_token() {
        let injector = AuthInjector::new(Arc::new(InMemorySession::new()));

        let original = RequestDescriptor::get("/servers");
        let descriptor = injector.inject(original.clone()).unwrap();
        assert_eq!(descriptor, original);
        assert!(!descriptor.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_replaces_caller_authorization_header() {
        let injector = AuthInjector::new(Arc::new(InMemorySession::with_token("fresh")));
        let descriptor = RequestDescriptor::get("/servers")
            .with_header("Authorization", "Bearer stale")
            .unwrap();

        let descriptor = injector.inject(descriptor).unwrap();
        assert_eq!(descriptor.headers()[AUTHORIZATION], "Bearer fresh");
    }

    #[test]
    fn test_unencodable_token_is_rejected() {
        let injector = AuthInjector::new(Arc::new(InMemorySession::with_token("bad\ntoken")));
        let result = injector.inject(RequestDescriptor::get("/servers"));
        assert!(matches!(result, Err(ApiError::InvalidHeaderValue(_))));
    }

    #[test]
    fn test_clear_forgets_token_and_identity() {
        let session = InMemorySession::new();
        session.set_session(
            "abc123".to_string(),
            Some(serde_json::json!({"username": "admin", "role": "admin"})),
        );
        assert!(session.is_authenticated());
        assert_eq!(session.identity().unwrap()["role"], "admin");

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(session.identity().is_none());
    }
}
