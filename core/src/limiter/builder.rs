//! Builder pattern for Limiter construction

use std::sync::Arc;
use std::time::Duration;

use crate::config::LimiterConfig;
use crate::error::Result;
use crate::traits::{AdmissionGate, Callback};

use super::executor::Limiter;

/// Builder for creating a Limiter with proper configuration
///
/// # Example
///
/// ```
/// use rate_runner_core::{BoxError, CallbackParams, LimiterBuilder};
///
/// let limiter = LimiterBuilder::new()
///     .concurrency(4)
///     .limit(1000)
///     .qps(100)
///     .callback(|params: CallbackParams| async move {
///         let _ = params.worker_id;
///         Ok::<(), BoxError>(())
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(limiter.config().concurrency, 4);
/// ```
pub struct LimiterBuilder {
    config: LimiterConfig,
    callback: Option<Arc<dyn Callback>>,
    gate: Option<Arc<dyn AdmissionGate>>,
}

impl LimiterBuilder {
    /// Create a new limiter builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LimiterConfig::default(),
            callback: None,
            gate: None,
        }
    }

    /// Set the full configuration
    pub fn config(mut self, config: LimiterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of workers
    pub fn concurrency(mut self, concurrency: u32) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the total invocation limit (0 = unbounded)
    pub fn limit(mut self, limit: u32) -> Self {
        self.config.limit = limit;
        self
    }

    /// Set the admissions per second (0 = unlimited)
    pub fn qps(mut self, qps: u32) -> Self {
        self.config.qps = qps;
        self
    }

    /// Set the maximum run duration (zero = unbounded)
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    /// Cancel the run on SIGINT/SIGTERM
    pub fn signal_handler(mut self, enabled: bool) -> Self {
        self.config.signal_handler = enabled;
        self
    }

    /// Set the callback invoked on every admitted iteration
    pub fn callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Set a callback that is already shared
    pub fn shared_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Replace the default token bucket gate
    pub fn gate(mut self, gate: impl AdmissionGate + 'static) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Build the limiter
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn build(self) -> Result<Limiter> {
        Limiter::from_parts(self.config, self.callback, self.gate)
    }
}

impl Default for LimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::{BoxError, LimiterError};
    use crate::traits::CallbackParams;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_defaults_are_rejected() {
        let result = LimiterBuilder::new().build();
        assert_eq!(
            result.unwrap_err(),
            LimiterError::Config(ConfigError::Unbounded)
        );
    }

    #[test]
    fn test_builder_limit_below_concurrency() {
        let result = LimiterBuilder::new().concurrency(8).limit(4).build();
        assert!(matches!(
            result.unwrap_err(),
            LimiterError::Config(ConfigError::LimitBelowConcurrency {
                limit: 4,
                concurrency: 8
            })
        ));
    }

    #[test]
    fn test_builder_without_callback() {
        let limiter = LimiterBuilder::new()
            .concurrency(2)
            .duration(Duration::from_millis(10))
            .build()
            .expect("Failed to build limiter");

        assert_eq!(limiter.config().concurrency, 2);
        assert_eq!(limiter.config().duration, Duration::from_millis(10));
        assert!(!limiter.is_finished());
    }

    #[test]
    fn test_builder_config_then_override() {
        let limiter = LimiterBuilder::new()
            .config(LimiterConfig::new(3).with_limit(30))
            .qps(10)
            .signal_handler(true)
            .build()
            .expect("Failed to build limiter");

        let config = limiter.config();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.limit, 30);
        assert_eq!(config.qps, 10);
        assert!(config.signal_handler);
    }

    #[tokio::test]
    async fn test_builder_shared_callback_across_limiters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Arc<dyn Callback> = Arc::new(move |_params: CallbackParams| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        });

        let first = LimiterBuilder::new()
            .limit(5)
            .shared_callback(Arc::clone(&callback))
            .build()
            .expect("Failed to build limiter");
        let second = LimiterBuilder::new()
            .limit(7)
            .shared_callback(callback)
            .build()
            .expect("Failed to build limiter");

        first.run().await.unwrap();
        second.run().await.unwrap();

        assert_eq!(first.num_of_queries(), 5);
        assert_eq!(second.num_of_queries(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 12);
    }
}
