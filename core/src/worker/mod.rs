//! Worker module for executing admitted invocations
//!
//! The Worker is the execution unit of a run, responsible for the simple but
//! critical loop: **admit -> check limit -> count -> invoke -> repeat**.
//!
//! Each Worker is a tokio task that:
//!
//! 1. Waits on the shared admission gate (the only blocking point)
//! 2. Stops if the aggregate counter already reached the query limit
//! 3. Bumps its own counter and the aggregate counter
//! 4. Invokes the callback with its 1-based id
//! 5. Repeats until the gate reports deadline/cancel/failure or the callback fails
//!
//! Workers never coordinate with each other directly. A stop condition that
//! applies to the whole run (deadline, cancel) is discovered by every worker
//! through its own gate wait.

mod counters;
mod executor;
mod rate_limiter;

pub use counters::Counters;
pub use executor::ExitReason;
pub(crate) use executor::Worker;
pub use rate_limiter::{GateError, RateGate};
