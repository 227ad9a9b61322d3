//! Domain-driven configuration management for Tether
//!
//! This crate provides modular configuration split by functional domains
//! (API endpoint, retry policy, logging), with validation, defaults, and
//! environment variable support.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    api::{ApiConfig, ConnectionPoolConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    retry::RetryConfig,
    TetherConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
