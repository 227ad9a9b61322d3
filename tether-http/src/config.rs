//! API client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_config::{ApiConfig, ConnectionPoolConfig, TetherConfig};
use tether_resilience::RetryPolicy;

/// API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL joined with the API prefix; every path is resolved under it
    pub api_root: String,

    /// Per-attempt timeout, unless the request overrides it
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Connection pool settings for the reqwest transport
    pub connection_pool: ConnectionPoolConfig,

    /// Retry policy applied to every call
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_parts(&ApiConfig::default(), RetryPolicy::default())
    }
}

impl ClientConfig {
    fn from_parts(api: &ApiConfig, retry: RetryPolicy) -> Self {
        Self {
            api_root: api.api_root(),
            timeout: api.timeout,
            user_agent: api.user_agent.clone(),
            verify_ssl: api.verify_ssl,
            connection_pool: api.connection_pool.clone(),
            retry,
        }
    }

    /// Point the client at a different API root
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&TetherConfig> for ClientConfig {
    fn from(config: &TetherConfig) -> Self {
        Self::from_parts(&config.api, RetryPolicy::from(&config.retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_api_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.api_root, "http://localhost:8000/api");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_from_tether_config() {
        let mut tether = TetherConfig::default();
        tether.api.base_url = "https://inventory.example.com".to_string();
        tether.api.api_prefix = "/api/v1".to_string();
        tether.retry.max_retries = 1;

        let config = ClientConfig::from(&tether);
        assert_eq!(config.api_root, "https://inventory.example.com/api/v1");
        assert_eq!(config.retry.max_retries, 1);
    }
}
