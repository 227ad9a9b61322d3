//! Reachability state and its subscriber registry

use parking_lot::{ReentrantMutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Observer notified when reachability changes
pub trait ReachabilityListener: Send + Sync {
    fn on_change(&self, reachable: bool);
}

impl<F> ReachabilityListener for F
where
    F: Fn(bool) + Send + Sync,
{
    fn on_change(&self, reachable: bool) {
        self(reachable)
    }
}

type ListenerEntry = (u64, Arc<dyn ReachabilityListener>);

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<ListenerEntry>>,
}

impl ListenerRegistry {
    fn insert(&self, listener: Arc<dyn ReachabilityListener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, listener));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Clone the current listeners so none are invoked under the registry lock
    fn snapshot(&self) -> Vec<ListenerEntry> {
        self.entries.read().clone()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        removed
    }
}

/// Process-wide "is the backend reachable" flag
///
/// Construct one per application and share it. Transitions are serialized:
/// a change and the notification of every listener complete before the next
/// change is applied, and setting the value already held notifies no one.
pub struct ReachabilitySignal {
    reachable: AtomicBool,
    transition: ReentrantMutex<()>,
    registry: Arc<ListenerRegistry>,
}

impl ReachabilitySignal {
    /// Create a signal with the given initial state
    pub fn new(initially_reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(initially_reachable),
            transition: ReentrantMutex::new(()),
            registry: Arc::new(ListenerRegistry::default()),
        }
    }

    /// Current cached state
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Register a listener for transitions
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: ReachabilityListener + 'static,
    {
        let id = self.registry.insert(Arc::new(listener));
        debug!(listener_id = id, "Reachability listener registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    /// Record a new observation
    ///
    /// Only the transport layer and the connectivity feed should call this.
    /// Returns `true` when the value changed and listeners were notified.
    /// Listeners run synchronously, in registration order; a panicking
    /// listener is logged and the rest still run.
    pub fn set_reachable(&self, reachable: bool) -> bool {
        let _transition = self.transition.lock();

        if self.reachable.load(Ordering::Acquire) == reachable {
            return false;
        }
        self.reachable.store(reachable, Ordering::Release);

        if reachable {
            info!("Backend reachable again");
        } else {
            warn!("Backend unreachable");
        }

        for (id, listener) in self.registry.snapshot() {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_change(reachable)));
            if let Err(payload) = delivered {
                warn!(
                    listener_id = id,
                    "Reachability listener panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        true
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Drop every listener; used when the application shuts down
    pub fn close(&self) {
        let removed = self.registry.clear();
        debug!(removed, "Reachability signal closed");
    }
}

impl Default for ReachabilitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for ReachabilitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilitySignal")
            .field("reachable", &self.is_reachable())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Disposer for a registered listener
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the listener; calling this more than once is harmless
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!(listener_id = self.id, "Reachability listener removed");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
