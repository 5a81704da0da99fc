//! Limiter configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limiter configuration
///
/// Defines how many workers run, how many invocations are allowed in total,
/// how fast they may be admitted and for how long the run may last.
/// Zero means "no bound" for `limit`, `qps` and `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Number of concurrent workers
    pub concurrency: u32,

    /// Total number of invocations across all workers (0 = unbounded)
    pub limit: u32,

    /// Invocations per second across all workers (0 = unlimited)
    pub qps: u32,

    /// Maximum run duration (zero = unbounded), serialized as seconds
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    /// Cancel the run on SIGINT/SIGTERM
    pub signal_handler: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            limit: 0,
            qps: 0,
            duration: Duration::ZERO,
            signal_handler: false,
        }
    }
}

impl LimiterConfig {
    /// Create a new config with the given concurrency
    pub fn new(concurrency: u32) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    /// Set the total invocation limit
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the invocations-per-second limit
    pub fn with_qps(mut self, qps: u32) -> Self {
        self.qps = qps;
        self
    }

    /// Set the maximum run duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Enable or disable signal-driven cancellation
    pub fn with_signal_handler(mut self, enabled: bool) -> Self {
        self.signal_handler = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit > 0 && self.limit < self.concurrency {
            return Err(ConfigError::LimitBelowConcurrency {
                limit: self.limit,
                concurrency: self.concurrency,
            });
        }

        if self.limit == 0 && self.duration.is_zero() {
            return Err(ConfigError::Unbounded);
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A limit below the worker count
    #[error("limit value must be greater than concurrency value (limit {limit}, concurrency {concurrency})")]
    LimitBelowConcurrency {
        /// Configured limit
        limit: u32,
        /// Configured concurrency
        concurrency: u32,
    },

    /// Neither a limit nor a duration was set
    #[error("set either limit or duration value")]
    Unbounded,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LimiterConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.limit, 0);
        assert_eq!(config.qps, 0);
        assert!(config.duration.is_zero());
        assert!(!config.signal_handler);
    }

    #[test]
    fn test_default_config_needs_a_stop_condition() {
        assert_eq!(
            LimiterConfig::default().validate(),
            Err(ConfigError::Unbounded)
        );
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = LimiterConfig::new(10)
            .with_limit(1000)
            .with_qps(100)
            .with_duration(Duration::from_secs(60))
            .with_signal_handler(true);

        assert_eq!(config.concurrency, 10);
        assert_eq!(config.limit, 1000);
        assert_eq!(config.qps, 100);
        assert_eq!(config.duration, Duration::from_secs(60));
        assert!(config.signal_handler);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_limit_below_concurrency() {
        let config = LimiterConfig::new(10).with_limit(5);
        assert_eq!(
            config.validate(),
            Err(ConfigError::LimitBelowConcurrency {
                limit: 5,
                concurrency: 10
            })
        );
    }

    #[test]
    fn test_config_validation_limit_equal_to_concurrency() {
        assert!(LimiterConfig::new(10).with_limit(10).validate().is_ok());
    }

    #[test]
    fn test_config_validation_duration_only() {
        let config = LimiterConfig::new(4).with_duration(Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_concurrency() {
        let config = LimiterConfig::new(0).with_duration(Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_duration_as_seconds() {
        let config: LimiterConfig =
            serde_json::from_str(r#"{"concurrency": 4, "qps": 20, "duration": 1.5}"#).unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.qps, 20);
        assert_eq!(config.limit, 0);
        assert_eq!(config.duration, Duration::from_millis(1500));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"duration\":1.5"));
    }

    #[test]
    fn test_config_negative_duration_rejected() {
        let result: Result<LimiterConfig, _> = serde_json::from_str(r#"{"duration": -1.0}"#);
        assert!(result.is_err());
    }
}
