//! Configuration types for rmq
//!
//! A connection needs little more than the store URL and the heartbeat
//! cadence; everything else (prefetch limits, poll intervals, buffer sizes)
//! is passed per call on the queue itself.

use std::time::Duration;

/// Configuration for opening a connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Redis connection URL
    pub url: String,
    /// How often the heartbeat key is refreshed
    pub heartbeat_interval: Duration,
    /// Expiry of the heartbeat key (consider the connection dead after this)
    pub heartbeat_ttl: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_ttl: Duration::from_secs(60),
        }
    }
}

impl ConnectionConfig {
    /// Create config with a custom Redis URL
    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_config_with_url() {
        let config = ConnectionConfig::with_url("redis://custom:6380");
        assert_eq!(config.url, "redis://custom:6380");
        assert_eq!(config.heartbeat_ttl, Duration::from_secs(60));
    }
}
