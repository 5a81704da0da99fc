//! Rate limiting for worker admission

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::context::{ContextError, RunContext};
use crate::traits::AdmissionGate;

/// Reasons an admission wait can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The run was canceled while waiting
    #[error("context canceled")]
    Canceled,

    /// The run deadline elapsed while waiting
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The gate itself failed
    #[error("rate error: {0}")]
    Rate(String),
}

impl From<ContextError> for GateError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Token bucket gate via the governor crate
///
/// One instance is shared by every worker, so the rate is global. The bucket
/// holds a single token: after the first admission each caller waits out its
/// full interval.
pub struct RateGate {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    qps: u32,
}

impl RateGate {
    /// Create a new gate
    ///
    /// # Arguments
    /// * `qps` - Admissions per second. Zero disables rate limiting.
    ///
    /// # Examples
    /// ```
    /// use rate_runner_core::worker::RateGate;
    ///
    /// // 100 admissions per second
    /// let gate = RateGate::new(100);
    /// assert!(gate.is_enabled());
    ///
    /// // No rate limiting
    /// let unlimited = RateGate::new(0);
    /// assert!(!unlimited.is_enabled());
    /// ```
    pub fn new(qps: u32) -> Self {
        let limiter = NonZeroU32::new(qps).map(|rate| {
            let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
            RateLimiter::direct(quota)
        });

        Self { limiter, qps }
    }

    /// Create a gate that admits immediately
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Try to take a slot without waiting
    ///
    /// Always `true` if no rate limit is configured.
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Configured admissions per second (0 = unlimited)
    pub fn qps(&self) -> u32 {
        self.qps
    }
}

#[async_trait]
impl AdmissionGate for RateGate {
    async fn wait(&self, ctx: &RunContext) -> Result<(), GateError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let Some(limiter) = &self.limiter else {
            // Nothing to wait on, so hand the thread back before admitting
            tokio::task::yield_now().await;
            return Ok(());
        };

        tokio::select! {
            biased;

            err = ctx.done() => Err(err.into()),
            _ = limiter.until_ready() => Ok(()),
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("qps", &self.qps)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
