//! Run report aggregated from the counters and termination state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::ExitReason;

use super::executor::Limiter;

/// Point-in-time summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of workers
    pub concurrency: u32,

    /// Configured invocation limit (0 = unbounded)
    pub limit: u32,

    /// Configured admissions per second (0 = unlimited)
    pub qps: u32,

    /// Wall-clock start of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Elapsed seconds, frozen once the run finished
    pub elapsed_secs: f64,

    /// Total invocations across all workers
    pub total: u64,

    /// Invocations per worker, worker 1 first
    pub per_worker: Vec<u64>,

    /// Why each worker stopped; `None` while it is still running
    pub exit_reasons: Vec<Option<ExitReason>>,

    /// Achieved invocations per second
    pub queries_per_second: f64,

    /// Whether `run` has returned
    pub finished: bool,

    /// Deadline reached
    pub deadline: bool,

    /// Run canceled
    pub canceled: bool,

    /// Query limit reached
    pub query_limit: bool,

    /// Admission gate failed
    pub rate_error: bool,

    /// Callback failed
    pub callback_error: bool,

    /// Last recorded failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RunReport {
    pub(crate) fn collect(
        limiter: &Limiter,
        exit_reasons: Vec<Option<ExitReason>>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        let config = limiter.config();
        let elapsed_secs = limiter.elapsed().as_secs_f64();
        let total = limiter.num_of_queries();
        let queries_per_second = if elapsed_secs > 0.0 {
            total as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            concurrency: config.concurrency,
            limit: config.limit,
            qps: config.qps,
            started_at,
            elapsed_secs,
            total,
            per_worker: limiter.counters().per_worker(),
            exit_reasons,
            queries_per_second,
            finished: limiter.is_finished(),
            deadline: limiter.is_deadline(),
            canceled: limiter.is_canceled(),
            query_limit: limiter.is_query_limit(),
            rate_error: limiter.is_rate_error(),
            callback_error: limiter.is_callback_error(),
            last_error: limiter.last_error().map(|e| e.to_string()),
        }
    }

    /// Conditions that ended the run, in a stable order
    pub fn stop_reasons(&self) -> Vec<&'static str> {
        [
            (self.deadline, "deadline"),
            (self.canceled, "canceled"),
            (self.query_limit, "query limit"),
            (self.rate_error, "rate error"),
            (self.callback_error, "callback error"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    /// Whether the run ended on a gate or callback failure
    pub fn is_failure(&self) -> bool {
        self.rate_error || self.callback_error
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "queries: {} in {:.3}s ({:.2} qps)",
            self.total, self.elapsed_secs, self.queries_per_second
        )?;
        writeln!(
            f,
            "config: concurrency={} limit={} qps={}",
            self.concurrency, self.limit, self.qps
        )?;
        for (idx, count) in self.per_worker.iter().enumerate() {
            writeln!(f, "  worker {}: {}", idx + 1, count)?;
        }

        let reasons = self.stop_reasons();
        if reasons.is_empty() {
            write!(f, "stopped: -")?;
        } else {
            write!(f, "stopped: {}", reasons.join(", "))?;
        }
        if let Some(err) = &self.last_error {
            write!(f, "\nlast error: {}", err)?;
        }
        Ok(())
    }
}
