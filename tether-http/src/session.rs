//! Session termination on authentication failure

use std::sync::Arc;
use tracing::warn;

use crate::auth::SessionStore;

/// Host hook invoked after the local session has been cleared
///
/// The host decides where the user goes next (typically its sign-in entry
/// point); the client only reports that the session ended.
pub trait SessionExpiredHandler: Send + Sync {
    fn on_session_expired(&self);
}

impl<F> SessionExpiredHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_session_expired(&self) {
        self()
    }
}

/// Ends the local session when the server rejects the credential
#[derive(Clone)]
pub struct SessionGuard {
    session: Arc<dyn SessionStore>,
    on_expired: Option<Arc<dyn SessionExpiredHandler>>,
}

impl SessionGuard {
    pub fn new(
        session: Arc<dyn SessionStore>,
        on_expired: Option<Arc<dyn SessionExpiredHandler>>,
    ) -> Self {
        Self {
            session,
            on_expired,
        }
    }

    /// Clear the session, then hand control to the host
    pub fn session_expired(&self) {
        self.session.clear();
        warn!("Credential rejected by server, local session cleared");

        match &self.on_expired {
            Some(handler) => handler.on_session_expired(),
            None => warn!("No session-expired handler registered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemorySession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clears_session_before_notifying() {
        let session = Arc::new(InMemorySession::with_token("abc123"));
        let calls = Arc::new(AtomicUsize::new(0));

        let observed_session = session.clone();
        let observed_calls = calls.clone();
        let handler: Arc<dyn SessionExpiredHandler> = Arc::new(move || {
            // The credential is already gone when the host is told
            assert!(!observed_session.is_authenticated());
            observed_calls.fetch_add(1, Ordering::SeqCst);
        });

        let guard = SessionGuard::new(session.clone(), Some(handler));
        guard.session_expired();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_without_handler_still_clears() {
        let session = Arc::new(InMemorySession::with_token("abc123"));
        SessionGuard::new(session.clone(), None).session_expired();
        assert!(!session.is_authenticated());
    }
}
