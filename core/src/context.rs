//! Cancellation and deadline context shared by every worker of a run

use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a [`RunContext`] is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The context was canceled explicitly or by a signal
    #[error("context canceled")]
    Canceled,

    /// The deadline elapsed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Shared cancellation handle with an optional deadline
///
/// Clones observe the same state. Cancellation is sticky and the deadline can
/// be armed at most once.
#[derive(Clone)]
pub struct RunContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cancel_tx: watch::Sender<bool>,
    deadline: OnceLock<Instant>,
}

impl RunContext {
    /// Create a context with no deadline
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                cancel_tx,
                deadline: OnceLock::new(),
            }),
        }
    }

    /// Create a context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        let ctx = Self::new();
        ctx.set_deadline(deadline);
        ctx
    }

    /// Arm the deadline. Returns `false` if one was already set.
    pub fn set_deadline(&self, deadline: Instant) -> bool {
        self.inner.deadline.set(deadline).is_ok()
    }

    /// The deadline, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline.get().copied()
    }

    /// Cancel the context, waking every waiter
    pub fn cancel(&self) {
        self.inner.cancel_tx.send_replace(true);
    }

    /// Whether `cancel` has been called
    pub fn is_canceled(&self) -> bool {
        *self.inner.cancel_tx.borrow()
    }

    /// Why the context is done, or `None` while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if self.is_canceled() {
            Some(ContextError::Canceled)
        } else if self.deadline().is_some_and(|d| Instant::now() >= d) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Wait until the context is canceled or its deadline elapses
    pub async fn done(&self) -> ContextError {
        let mut cancel_rx = self.inner.cancel_tx.subscribe();

        match self.deadline() {
            Some(deadline) => tokio::select! {
                _ = cancel_rx.wait_for(|canceled| *canceled) => ContextError::Canceled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                // The sender lives as long as `self`, so this only returns on cancel
                let _ = cancel_rx.wait_for(|canceled| *canceled).await;
                ContextError::Canceled
            }
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("canceled", &self.is_canceled())
            .field("deadline", &self.deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_context_starts_live() {
        let ctx = RunContext::new();
        assert!(!ctx.is_canceled());
        assert!(ctx.deadline().is_none());
        assert_eq!(ctx.err(), None);
    }

    #[test]
    fn test_context_cancel_is_shared_by_clones() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        clone.cancel();

        assert!(ctx.is_canceled());
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_context_deadline_set_once() {
        let ctx = RunContext::new();
        let deadline = Instant::now() + Duration::from_secs(60);
        assert!(ctx.set_deadline(deadline));
        assert!(!ctx.set_deadline(Instant::now()));
        assert_eq!(ctx.deadline(), Some(deadline));
    }

    #[test]
    fn test_context_cancel_wins_over_deadline() {
        let ctx = RunContext::with_deadline(Instant::now());
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));

        ctx.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_context_done_on_deadline() {
        let ctx = RunContext::with_deadline(Instant::now() + Duration::from_millis(20));
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_context_done_on_cancel() {
        let ctx = RunContext::new();
        let canceler = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceler.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), ctx.done()).await;
        assert_eq!(result, Ok(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_context_done_when_already_canceled() {
        let ctx = RunContext::with_deadline(Instant::now() + Duration::from_secs(60));
        ctx.cancel();
        assert_eq!(ctx.done().await, ContextError::Canceled);
    }
}
