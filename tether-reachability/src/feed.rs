//! Host connectivity events mapped onto the reachability signal

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::signal::ReachabilitySignal;

/// Connectivity transition reported by the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Connected,
    Disconnected,
}

impl ConnectivityEvent {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityEvent::Connected)
    }
}

/// Background task forwarding connectivity events to a [`ReachabilitySignal`]
///
/// Each event maps 1:1 onto `set_reachable`. The task ends when every sender
/// of the channel has been dropped.
#[derive(Debug)]
pub struct ConnectivityFeed {
    handle: JoinHandle<()>,
}

impl ConnectivityFeed {
    /// Spawn the forwarding task on the current tokio runtime
    pub fn spawn(
        signal: Arc<ReachabilitySignal>,
        mut events: mpsc::Receiver<ConnectivityEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!(?event, "Host connectivity event");
                signal.set_reachable(event.is_connected());
            }
            debug!("Connectivity event channel closed");
        });

        Self { handle }
    }

    /// Stop forwarding immediately
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the channel to close and the task to finish
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::warn!("Connectivity feed task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_events_map_onto_signal() {
        let signal = Arc::new(ReachabilitySignal::new(true));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = signal.subscribe(move |reachable: bool| sink.lock().push(reachable));

        let (tx, rx) = mpsc::channel(8);
        let feed = ConnectivityFeed::spawn(signal.clone(), rx);

        tx.send(ConnectivityEvent::Disconnected).await.unwrap();
        tx.send(ConnectivityEvent::Disconnected).await.unwrap();
        tx.send(ConnectivityEvent::Connected).await.unwrap();
        drop(tx);
        feed.join().await;

        assert!(signal.is_reachable());
        assert_eq!(*seen.lock(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_abort_stops_feed() {
        let signal = Arc::new(ReachabilitySignal::new(true));
        let (tx, rx) = mpsc::channel(1);
        let feed = ConnectivityFeed::spawn(signal.clone(), rx);

        feed.abort();
        feed.join().await;

        // The receiver is gone once the task is aborted
        assert!(tx.send(ConnectivityEvent::Disconnected).await.is_err());
        assert!(signal.is_reachable());
    }
}
