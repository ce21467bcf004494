//! Producer-node configuration.

use crate::auth::DEFAULT_CREDENTIAL_LEN;
use evcast_dispatch::RetryPolicy;
use std::time::Duration;

/// Configuration for a producer node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's own identity, carried in notifications so
    /// consumers know which producer to pull from.
    pub producer_url: String,
    /// Length of generated API keys and secrets.
    pub credential_len: usize,
    /// Retry behavior for failed deliveries.
    pub retry: RetryPolicy,
    /// Timeout for one liveness probe.
    pub probe_timeout: Duration,
}

impl NodeConfig {
    /// Creates a configuration for a producer at the given URL.
    pub fn new(producer_url: impl Into<String>) -> Self {
        Self {
            producer_url: producer_url.into(),
            credential_len: DEFAULT_CREDENTIAL_LEN,
            retry: RetryPolicy::default(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the credential length.
    pub fn with_credential_len(mut self, len: usize) -> Self {
        self.credential_len = len;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = NodeConfig::new("https://producer.example.com")
            .with_credential_len(24)
            .with_retry(RetryPolicy::new(3))
            .with_probe_timeout(Duration::from_secs(2));

        assert_eq!(config.producer_url, "https://producer.example.com");
        assert_eq!(config.credential_len, 24);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.credential_len, DEFAULT_CREDENTIAL_LEN);
        assert_eq!(config.retry.max_attempts, 8);
    }
}
