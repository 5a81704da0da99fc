//! Worker execution loop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::LimiterError;
use crate::limiter::Limiter;
use crate::traits::{AdmissionGate, Callback, CallbackParams};

use super::rate_limiter::GateError;

/// Why a single worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The run deadline elapsed during a gate wait
    DeadlineExceeded,
    /// The run was canceled during a gate wait
    Canceled,
    /// The aggregate counter had reached the query limit
    QueryLimit,
    /// The gate failed
    GateError,
    /// The callback failed
    CallbackError,
    /// The worker task panicked inside the callback
    Panicked,
}

/// Worker runs the loop: admit -> check limit -> count -> invoke -> repeat
///
/// Workers are tokio tasks spawned by [`Limiter::run`]. They share the gate,
/// the counters and the termination state through the limiter handle.
pub(crate) struct Worker {
    /// 1-based worker identifier
    id: usize,

    /// Global invocation limit (0 = unbounded)
    limit: u64,

    /// Admission gate (shared across workers via Arc)
    gate: Arc<dyn AdmissionGate>,

    /// Unit of work; `None` counts admissions only
    callback: Option<Arc<dyn Callback>>,

    /// Handle to the run this worker belongs to
    limiter: Limiter,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        gate: Arc<dyn AdmissionGate>,
        callback: Option<Arc<dyn Callback>>,
        limiter: Limiter,
    ) -> Self {
        Self {
            id,
            limit: u64::from(limiter.config().limit),
            gate,
            callback,
            limiter,
        }
    }

    /// Run the worker loop until a stop condition is observed
    pub(crate) async fn run(self) -> ExitReason {
        let context = self.limiter.context();
        let counters = self.limiter.counters();
        let state = self.limiter.termination();

        tracing::debug!(worker_id = self.id, "Worker started");

        let reason = loop {
            if let Err(err) = self.gate.wait(context).await {
                break match err {
                    GateError::DeadlineExceeded => {
                        state.mark_deadline();
                        ExitReason::DeadlineExceeded
                    }
                    GateError::Canceled => {
                        state.mark_canceled();
                        ExitReason::Canceled
                    }
                    GateError::Rate(message) => {
                        tracing::warn!(worker_id = self.id, error = %message, "Admission failed");
                        state.record_rate_error(LimiterError::Gate {
                            worker_id: self.id,
                            message,
                        });
                        ExitReason::GateError
                    }
                };
            }

            // Soft cap: concurrent workers may all pass this check at once
            if self.limit > 0 && counters.total() >= self.limit {
                state.mark_query_limit();
                break ExitReason::QueryLimit;
            }

            counters.record(self.id);

            if let Some(callback) = &self.callback {
                let params = CallbackParams {
                    limiter: self.limiter.clone(),
                    worker_id: self.id,
                };
                if let Err(e) = callback.call(params).await {
                    tracing::warn!(worker_id = self.id, error = %e, "Callback failed");
                    state.record_callback_error(LimiterError::Callback {
                        worker_id: self.id,
                        message: e.to_string(),
                    });
                    break ExitReason::CallbackError;
                }
            }
        };

        tracing::debug!(
            worker_id = self.id,
            completed = counters.by_worker(self.id),
            reason = ?reason,
            "Worker finished"
        );

        reason
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("limit", &self.limit)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
