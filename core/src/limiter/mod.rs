//! Limiter: run lifecycle management
//!
//! The Limiter coordinates a complete run:
//! - Arming the deadline and optional signal-driven cancellation
//! - Spawning one worker task per concurrency slot
//! - Waiting for every worker to stop
//! - Freezing elapsed time and reporting why the run ended
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rate_runner_core::{BoxError, CallbackParams, LimiterBuilder};
//!
//! # async fn demo() -> rate_runner_core::Result<()> {
//! let limiter = LimiterBuilder::new()
//!     .concurrency(10)
//!     .qps(50)
//!     .duration(Duration::from_secs(30))
//!     .signal_handler(true)
//!     .callback(|params: CallbackParams| async move {
//!         println!("worker {} at {}", params.worker_id, params.limiter.num_of_queries());
//!         Ok::<(), BoxError>(())
//!     })
//!     .build()?;
//!
//! limiter.run().await?;
//! println!("{}", limiter.snapshot());
//! # Ok(())
//! # }
//! ```

mod builder;
mod executor;
mod report;
mod state;

pub use builder::LimiterBuilder;
pub use executor::Limiter;
pub use report::RunReport;
