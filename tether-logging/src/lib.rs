//! Structured logging bootstrap for Tether
//!
//! All crates in the workspace emit diagnostics through `tracing`; this crate
//! installs the global subscriber described by [`LoggingConfig`].

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use tether_config::{LogFormat, LogLevel, LoggingConfig};
