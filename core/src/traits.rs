//! Core traits for the unit of work and the admission gate
//!
//! Both are seams: the limiter only knows how to ask a gate for the next slot
//! and how to invoke a callback, never what either does internally.

use async_trait::async_trait;
use std::future::Future;

use crate::context::RunContext;
use crate::error::BoxError;
use crate::limiter::Limiter;
use crate::worker::GateError;

// ============================================================================
// Callback Trait
// ============================================================================

/// Parameters handed to every callback invocation
#[derive(Debug, Clone)]
pub struct CallbackParams {
    /// The running limiter; any accessor may be read from inside the callback
    pub limiter: Limiter,

    /// 1-based id of the worker performing this invocation
    pub worker_id: usize,
}

/// The unit of work invoked once per admitted iteration
///
/// Returning an error stops the invoking worker and fails the run. Any
/// `Fn(CallbackParams) -> impl Future<Output = Result<(), BoxError>>`
/// implements this trait.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Perform one unit of work
    async fn call(&self, params: CallbackParams) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> Callback for F
where
    F: Fn(CallbackParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn call(&self, params: CallbackParams) -> Result<(), BoxError> {
        (self)(params).await
    }
}

// ============================================================================
// Admission Gate Trait
// ============================================================================

/// Gate that admits one invocation at a time at a bounded rate
///
/// Implementations must return promptly with [`GateError::Canceled`] or
/// [`GateError::DeadlineExceeded`] once `ctx` is done, including when they
/// would otherwise admit immediately.
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Wait for the next admission slot
    async fn wait(&self, ctx: &RunContext) -> Result<(), GateError>;
}
