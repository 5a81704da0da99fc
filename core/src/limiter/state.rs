//! Termination flags and run timing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::LimiterError;

/// Why a run stopped
///
/// Each flag is set by the worker that observed the condition. Several may be
/// set at once when workers race near the stopping instant.
#[derive(Debug, Default)]
pub struct TerminationState {
    deadline: AtomicBool,
    canceled: AtomicBool,
    query_limit: AtomicBool,
    rate_error: AtomicBool,
    callback_error: AtomicBool,
    last_error: Mutex<Option<LimiterError>>,
}

impl TerminationState {
    pub(crate) fn mark_deadline(&self) {
        self.deadline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_canceled(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_query_limit(&self) {
        self.query_limit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn record_rate_error(&self, err: LimiterError) {
        self.rate_error.store(true, Ordering::SeqCst);
        self.set_last_error(err);
    }

    pub(crate) fn record_callback_error(&self, err: LimiterError) {
        self.callback_error.store(true, Ordering::SeqCst);
        self.set_last_error(err);
    }

    fn set_last_error(&self, err: LimiterError) {
        let mut last = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(err);
    }

    /// Most recently recorded gate or callback error
    pub fn last_error(&self) -> Option<LimiterError> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deadline reached
    pub fn is_deadline(&self) -> bool {
        self.deadline.load(Ordering::SeqCst)
    }

    /// Run canceled
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Query limit reached
    pub fn is_query_limit(&self) -> bool {
        self.query_limit.load(Ordering::SeqCst)
    }

    /// Admission gate failed
    pub fn is_rate_error(&self) -> bool {
        self.rate_error.load(Ordering::SeqCst)
    }

    /// Callback failed
    pub fn is_callback_error(&self) -> bool {
        self.callback_error.load(Ordering::SeqCst)
    }
}

/// Start instant and frozen elapsed time of a run
#[derive(Debug, Default)]
pub(crate) struct RunClock {
    start: OnceLock<Instant>,
    started_at: OnceLock<DateTime<Utc>>,
    since: OnceLock<Duration>,
}

impl RunClock {
    /// Record the start; later calls return the first instant
    pub(crate) fn start(&self) -> Instant {
        let start = *self.start.get_or_init(Instant::now);
        self.started_at.get_or_init(Utc::now);
        start
    }

    /// Freeze the elapsed time
    pub(crate) fn finish(&self) -> Duration {
        let elapsed = self.live_elapsed();
        *self.since.get_or_init(|| elapsed)
    }

    /// Live while running, frozen once finished, zero before start
    pub(crate) fn elapsed(&self) -> Duration {
        match self.since.get() {
            Some(since) => *since,
            None => self.live_elapsed(),
        }
    }

    pub(crate) fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.get().copied()
    }

    fn live_elapsed(&self) -> Duration {
        self.start
            .get()
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_state_defaults() {
        let state = TerminationState::default();
        assert!(!state.is_deadline());
        assert!(!state.is_canceled());
        assert!(!state.is_query_limit());
        assert!(!state.is_rate_error());
        assert!(!state.is_callback_error());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_termination_flags_are_independent() {
        let state = TerminationState::default();
        state.mark_deadline();
        state.mark_query_limit();

        assert!(state.is_deadline());
        assert!(state.is_query_limit());
        assert!(!state.is_canceled());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_termination_last_error_wins() {
        let state = TerminationState::default();
        state.record_rate_error(LimiterError::Gate {
            worker_id: 1,
            message: "first".into(),
        });
        state.record_callback_error(LimiterError::Callback {
            worker_id: 2,
            message: "second".into(),
        });

        assert!(state.is_rate_error());
        assert!(state.is_callback_error());
        assert_eq!(
            state.last_error(),
            Some(LimiterError::Callback {
                worker_id: 2,
                message: "second".into()
            })
        );
    }

    #[test]
    fn test_clock_before_start() {
        let clock = RunClock::default();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert!(clock.started_at().is_none());
    }

    #[test]
    fn test_clock_frozen_after_finish() {
        let clock = RunClock::default();
        clock.start();
        std::thread::sleep(Duration::from_millis(10));

        let frozen = clock.finish();
        assert!(frozen >= Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.elapsed(), frozen);
        assert_eq!(clock.finish(), frozen);
        assert!(clock.started_at().is_some());
    }

    #[test]
    fn test_clock_live_is_monotonic() {
        let clock = RunClock::default();
        clock.start();

        let mut previous = clock.elapsed();
        for _ in 0..100 {
            let current = clock.elapsed();
            assert!(current >= previous);
            previous = current;
        }
    }
}
