//! Backend reachability for Tether
//!
//! A single [`ReachabilitySignal`] is created at application start and shared
//! (via `Arc`) with the API client and with UI consumers. The client feeds it
//! call outcomes, the [`ConnectivityFeed`] feeds it host connectivity events,
//! and consumers read it or subscribe to transitions.

pub mod feed;
pub mod signal;

pub use feed::{ConnectivityEvent, ConnectivityFeed};
pub use signal::{ReachabilityListener, ReachabilitySignal, Subscription};
