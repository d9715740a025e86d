//! Fabric configuration.

use crate::activity::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_poll_interval_secs() -> f64 {
    DEFAULT_POLL_INTERVAL.as_secs_f64()
}

/// Settings for the shared fabric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub activity: ActivityConfig,
}

/// Activity poller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Seconds between poll ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ActivityConfig {
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval_secs.is_finite() && self.poll_interval_secs > 0.0 {
            Duration::from_secs_f64(self.poll_interval_secs).max(MIN_POLL_INTERVAL)
        } else {
            DEFAULT_POLL_INTERVAL
        }
    }
}

impl FoundryConfig {
    /// Checks values for consistency.
    pub fn validate(&self) -> Result<(), String> {
        let interval = self.activity.poll_interval_secs;
        if !interval.is_finite() || interval < MIN_POLL_INTERVAL.as_secs_f64() {
            return Err(format!(
                "activity.poll_interval_secs must be at least {}",
                MIN_POLL_INTERVAL.as_secs_f64()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FoundryConfig::default();
        assert_eq!(config.activity.poll_interval_secs, 2.0);
        assert_eq!(config.activity.poll_interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = FoundryConfig::default();
        config.activity.poll_interval_secs = 0.0;
        assert!(config.validate().is_err());
        assert_eq!(config.activity.poll_interval(), DEFAULT_POLL_INTERVAL);

        config.activity.poll_interval_secs = f64::NAN;
        assert!(config.validate().is_err());

        config.activity.poll_interval_secs = 0.5;
        assert!(config.validate().is_ok());
        assert_eq!(config.activity.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: FoundryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FoundryConfig::default());
        let config: FoundryConfig = serde_json::from_str(r#"{"activity": {}}"#).unwrap();
        assert_eq!(config.activity.poll_interval_secs, 2.0);
    }
}
