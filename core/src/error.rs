//! Error types for rate-runner-core

use thiserror::Error;

use crate::config::ConfigError;

/// Error type for constructing and running a [`Limiter`](crate::Limiter)
///
/// Deadline, cancellation and the query limit are expected ways for a run to
/// end and never show up here; they are reported through the termination
/// flags instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The configuration was rejected at construction time
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `run` was called on a limiter that has already been run
    #[error("limiter has already been run")]
    AlreadyStarted,

    /// The admission gate failed for a reason other than deadline or cancellation
    #[error("rate error on worker {worker_id}: {message}")]
    Gate {
        /// 1-based id of the worker that observed the failure
        worker_id: usize,
        /// Error reported by the gate
        message: String,
    },

    /// The callback reported a failure
    #[error("callback error on worker {worker_id}: {message}")]
    Callback {
        /// 1-based id of the worker whose callback failed
        worker_id: usize,
        /// Error reported by the callback
        message: String,
    },

    /// A worker task panicked, which can only happen inside the callback
    #[error("worker {worker_id} panicked")]
    WorkerPanicked {
        /// 1-based id of the worker that panicked
        worker_id: usize,
    },
}

impl LimiterError {
    /// Id of the worker that produced the error, if any
    pub fn worker_id(&self) -> Option<usize> {
        match self {
            Self::Gate { worker_id, .. }
            | Self::Callback { worker_id, .. }
            | Self::WorkerPanicked { worker_id } => Some(*worker_id),
            Self::Config(_) | Self::AlreadyStarted => None,
        }
    }
}

/// Boxed error returned by callbacks and custom gates
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias
pub type Result<T> = std::result::Result<T, LimiterError>;
