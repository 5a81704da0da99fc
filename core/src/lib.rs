//! rate-runner-core: bounded-concurrency, rate-limited execution engine
//!
//! This crate runs a caller-supplied unit of work repeatedly across a fixed
//! pool of tokio workers, throttled to a global rate, until one of these
//! happens:
//!
//! - the total invocation limit is reached
//! - the run duration elapses
//! - the run is canceled (explicitly or by SIGINT/SIGTERM)
//! - the admission gate or the callback reports a failure
//!
//! The pieces, leaves first:
//!
//! - [`RateGate`]: token bucket admission (burst of one, or unlimited)
//! - [`Counters`]: aggregate and per-worker invocation counters
//! - [`Limiter`]: spawns the workers, waits for them, records why they stopped

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod limiter;
pub mod traits;
pub mod worker;

pub use config::{ConfigError, LimiterConfig};
pub use context::{ContextError, RunContext};
pub use error::*;
pub use limiter::{Limiter, LimiterBuilder, RunReport};
pub use traits::*;
pub use worker::{Counters, ExitReason, GateError, RateGate};
