//! Rebalancer configuration
//!
//! Polling parameters for node removal and readiness probing, with defaults
//! and environment overrides.

use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Node removal polling configuration
#[derive(Debug, Clone)]
pub struct RemovalConfig {
    /// Floor for the server-suggested poll interval
    pub min_poll_interval: Duration,
    /// Delay after a failed status poll
    pub status_retry_backoff: Duration,
    /// Consecutive "still present after rebalance" checks tolerated
    pub stuck_threshold: u32,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            min_poll_interval: Duration::from_secs(2),
            status_retry_backoff: Duration::from_millis(500),
            stuck_threshold: 10,
        }
    }
}

impl RemovalConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            min_poll_interval: env_millis("COUCHCTL_MIN_POLL_MS")?
                .unwrap_or(defaults.min_poll_interval),
            status_retry_backoff: env_millis("COUCHCTL_STATUS_BACKOFF_MS")?
                .unwrap_or(defaults.status_retry_backoff),
            stuck_threshold: env_parse("COUCHCTL_STUCK_THRESHOLD")?
                .unwrap_or(defaults.stuck_threshold),
        })
    }
}

/// Readiness/health probing configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Fixed interval between probes
    pub tick: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

impl ProbeConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let tick = env_millis("COUCHCTL_PROBE_TICK_MS")?.unwrap_or(Self::default().tick);
        if tick.is_zero() {
            return Err(ConfigError::InvalidValue(
                "COUCHCTL_PROBE_TICK_MS".to_string(),
                "0".to_string(),
            ));
        }
        Ok(Self { tick })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.min_poll_interval, Duration::from_secs(2));
        assert_eq!(config.status_retry_backoff, Duration::from_millis(500));
        assert_eq!(config.stuck_threshold, 10);
        assert_eq!(ProbeConfig::default().tick, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("COUCHCTL_STUCK_THRESHOLD", "3");
        std::env::set_var("COUCHCTL_MIN_POLL_MS", "250");
        let config = RemovalConfig::from_env().unwrap();
        assert_eq!(config.stuck_threshold, 3);
        assert_eq!(config.min_poll_interval, Duration::from_millis(250));
        std::env::remove_var("COUCHCTL_STUCK_THRESHOLD");
        std::env::remove_var("COUCHCTL_MIN_POLL_MS");
    }

    #[test]
    fn test_env_invalid_value() {
        std::env::set_var("COUCHCTL_TEST_INVALID_MS", "soon");
        let err = env_millis("COUCHCTL_TEST_INVALID_MS").unwrap_err();
        assert!(err.to_string().contains("COUCHCTL_TEST_INVALID_MS"));
        std::env::remove_var("COUCHCTL_TEST_INVALID_MS");
    }

    #[test]
    fn test_zero_probe_tick_rejected() {
        std::env::set_var("COUCHCTL_PROBE_TICK_MS", "0");
        assert!(ProbeConfig::from_env().is_err());
        std::env::remove_var("COUCHCTL_PROBE_TICK_MS");
    }
}
