//! Run configuration structs and defaults.

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::redfish::cache::DEFAULT_CACHE_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Attempts per logical operation (one job poll, one boot order PATCH...)
    pub retries: u32,
    /// In-flight requests across every host of the run
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    /// Wait between power state polls
    pub short_poll_secs: u64,
    /// Wait between job status polls and after reset actions
    pub long_poll_secs: u64,
    /// GET replies memoized per session
    pub cache_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            retries: 15,
            max_concurrent_requests: 50,
            request_timeout_secs: 60,
            short_poll_secs: 5,
            long_poll_secs: 10,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl RunConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn short_poll(&self) -> Duration {
        Duration::from_secs(self.short_poll_secs)
    }

    pub fn long_poll(&self) -> Duration {
        Duration::from_secs(self.long_poll_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(anyhow!("retries must be at least 1"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(anyhow!("cache_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.retries, 15);
        assert_eq!(config.max_concurrent_requests, 50);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.short_poll(), Duration::from_secs(5));
        assert_eq!(config.long_poll(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"retries": 3}"#).unwrap();
        assert_eq!(config.retries, 3);
        assert_eq!(config.cache_capacity, 64);
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = RunConfig {
            retries: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
