//! Limiter execution logic

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::LimiterConfig;
use crate::context::RunContext;
use crate::error::{LimiterError, Result};
use crate::traits::{AdmissionGate, Callback};
use crate::worker::{Counters, ExitReason, RateGate, Worker};

use super::report::RunReport;
use super::state::{RunClock, TerminationState};

/// Limiter runs a callback across a worker pool at a bounded rate
///
/// A `Limiter` is a cheap handle: clones share the same run. It is built once
/// from a validated [`LimiterConfig`], run once, and read through its
/// accessors during and after the run.
#[derive(Clone)]
pub struct Limiter {
    inner: Arc<Shared>,
}

struct Shared {
    config: LimiterConfig,
    callback: Option<Arc<dyn Callback>>,
    gate: Option<Arc<dyn AdmissionGate>>,
    context: RunContext,
    counters: Counters,
    termination: TerminationState,
    exit_reasons: Mutex<Vec<Option<ExitReason>>>,
    clock: RunClock,
    started: AtomicBool,
    finished: AtomicBool,
}

impl Limiter {
    /// Create a new limiter
    ///
    /// Use [`LimiterBuilder`](super::LimiterBuilder) to run without a
    /// callback or with a custom admission gate.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Config`] if the configuration is invalid.
    pub fn new(config: LimiterConfig, callback: impl Callback + 'static) -> Result<Self> {
        let callback: Arc<dyn Callback> = Arc::new(callback);
        Self::from_parts(config, Some(callback), None)
    }

    pub(crate) fn from_parts(
        config: LimiterConfig,
        callback: Option<Arc<dyn Callback>>,
        gate: Option<Arc<dyn AdmissionGate>>,
    ) -> Result<Self> {
        config.validate()?;

        let workers = config.concurrency as usize;
        Ok(Self {
            inner: Arc::new(Shared {
                config,
                callback,
                gate,
                context: RunContext::new(),
                counters: Counters::new(workers),
                termination: TerminationState::default(),
                exit_reasons: Mutex::new(vec![None; workers]),
                clock: RunClock::default(),
                started: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        })
    }

    /// Run the limiter
    ///
    /// Spawns `concurrency` workers and waits for all of them to stop. Reaching
    /// the deadline, the query limit or being canceled is a normal end and
    /// returns `Ok(())`. A gate or callback failure returns the last error
    /// recorded by any worker.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::AlreadyStarted`] on a second call.
    pub async fn run(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(LimiterError::AlreadyStarted);
        }

        let config = &self.inner.config;
        let context = &self.inner.context;

        let start = self.inner.clock.start();
        if !config.duration.is_zero() {
            context.set_deadline(start + config.duration);
        }

        let signal_handle = config
            .signal_handler
            .then(|| spawn_signal_listener(context.clone(), shutdown_signal()));

        let gate: Arc<dyn AdmissionGate> = match &self.inner.gate {
            Some(gate) => Arc::clone(gate),
            None => Arc::new(RateGate::new(config.qps)),
        };

        tracing::info!(
            concurrency = config.concurrency,
            limit = config.limit,
            qps = config.qps,
            duration_ms = config.duration.as_millis() as u64,
            "Starting run"
        );

        let mut handles = Vec::with_capacity(config.concurrency as usize);
        for worker_id in 1..=config.concurrency as usize {
            let worker = Worker::new(
                worker_id,
                Arc::clone(&gate),
                self.inner.callback.clone(),
                self.clone(),
            );
            handles.push((worker_id, tokio::spawn(worker.run())));
        }

        for (worker_id, handle) in handles {
            let reason = match handle.await {
                Ok(reason) => reason,
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Worker task panicked");
                    self.inner
                        .termination
                        .record_callback_error(LimiterError::WorkerPanicked { worker_id });
                    ExitReason::Panicked
                }
            };
            self.set_exit_reason(worker_id, reason);
        }

        let elapsed = self.inner.clock.finish();
        self.inner.finished.store(true, Ordering::SeqCst);

        // Release the signal listener and anything else waiting on the context
        context.cancel();
        if let Some(handle) = signal_handle {
            handle.abort();
        }

        let termination = &self.inner.termination;
        tracing::info!(
            elapsed_secs = elapsed.as_secs_f64(),
            total = self.num_of_queries(),
            deadline = termination.is_deadline(),
            canceled = termination.is_canceled(),
            query_limit = termination.is_query_limit(),
            rate_error = termination.is_rate_error(),
            callback_error = termination.is_callback_error(),
            "Run completed"
        );

        match termination.last_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cancel the run
    ///
    /// Every worker stops at its next or in-flight gate wait. Canceling before
    /// `run` makes the run end immediately.
    pub fn cancel(&self) {
        self.inner.context.cancel();
    }

    /// The cancellation/deadline context shared by the workers
    pub fn context(&self) -> &RunContext {
        &self.inner.context
    }

    /// The validated configuration
    pub fn config(&self) -> &LimiterConfig {
        &self.inner.config
    }

    /// Time since start; frozen once the run is finished
    pub fn elapsed(&self) -> Duration {
        self.inner.clock.elapsed()
    }

    /// Total number of invocations across all workers
    pub fn num_of_queries(&self) -> u64 {
        self.inner.counters.total()
    }

    /// Number of invocations by one worker; 0 for ids outside `1..=concurrency`
    pub fn num_of_queries_by_worker(&self, worker_id: usize) -> u64 {
        self.inner.counters.by_worker(worker_id)
    }

    /// Why a worker stopped, once it has stopped
    pub fn exit_reason(&self, worker_id: usize) -> Option<ExitReason> {
        let reasons = self
            .inner
            .exit_reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        worker_id
            .checked_sub(1)
            .and_then(|idx| reasons.get(idx).copied().flatten())
    }

    /// Last gate or callback error recorded by any worker
    pub fn last_error(&self) -> Option<LimiterError> {
        self.inner.termination.last_error()
    }

    /// Whether the run reached its deadline
    pub fn is_deadline(&self) -> bool {
        self.inner.termination.is_deadline()
    }

    /// Whether the run was canceled
    pub fn is_canceled(&self) -> bool {
        self.inner.termination.is_canceled()
    }

    /// Whether the run reached its query limit
    pub fn is_query_limit(&self) -> bool {
        self.inner.termination.is_query_limit()
    }

    /// Whether the admission gate failed
    pub fn is_rate_error(&self) -> bool {
        self.inner.termination.is_rate_error()
    }

    /// Whether a callback failed
    pub fn is_callback_error(&self) -> bool {
        self.inner.termination.is_callback_error()
    }

    /// Whether `run` has returned
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    /// Point-in-time report of the run
    pub fn snapshot(&self) -> RunReport {
        let reasons = self
            .inner
            .exit_reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        RunReport::collect(self, reasons, self.inner.clock.started_at())
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.inner.counters
    }

    pub(crate) fn termination(&self) -> &TerminationState {
        &self.inner.termination
    }

    fn set_exit_reason(&self, worker_id: usize, reason: ExitReason) {
        let mut reasons = self
            .inner
            .exit_reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = worker_id.checked_sub(1).and_then(|idx| reasons.get_mut(idx)) {
            *slot = Some(reason);
        }
    }
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("config", &self.inner.config)
            .field("has_callback", &self.inner.callback.is_some())
            .field("custom_gate", &self.inner.gate.is_some())
            .field("total", &self.num_of_queries())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Cancel `context` once `signal` resolves
///
/// The listener exits on its own once the context is done.
pub(super) fn spawn_signal_listener<F>(context: RunContext, signal: F) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            result = signal => match result {
                Ok(()) => {
                    tracing::info!("Received shutdown signal, canceling run...");
                    context.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
            },
            _ = context.done() => {}
        }
    })
}

/// Resolves on SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
