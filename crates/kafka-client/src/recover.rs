//! Panic supervision for pipeline workers.
//!
//! The join result of a worker spawned on the runtime is classified by
//! [`recover`], which turns a panic into an ordinary stop instead of tearing
//! down the pipeline. What happens to the panic payload is decided by a
//! [`PanicPolicy`].

use std::any::Any;

use tokio::task::JoinError;
use tracing::warn;

/// What to do with a panic caught at a worker boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Swallow the panic and stop the worker as if it had finished.
    #[default]
    Discard,
    /// Log the panic message and stop the worker.
    Log,
    /// Resume unwinding in the supervising task.
    Propagate,
}

/// How a supervised worker finished.
#[derive(Debug, PartialEq, Eq)]
pub enum Recovered<T> {
    /// The worker returned normally.
    Completed(T),
    /// The worker panicked and the policy recovered it.
    Panicked,
    /// The worker was aborted before it finished.
    Cancelled,
}

impl PanicPolicy {
    fn handle(self, worker: &str, payload: Box<dyn Any + Send + 'static>) {
        match self {
            PanicPolicy::Discard => {}
            PanicPolicy::Log => {
                warn!("{} worker panicked: {}", worker, panic_message(&*payload));
            }
            PanicPolicy::Propagate => std::panic::resume_unwind(payload),
        }
    }
}

/// Classify the join result of a worker.
pub fn recover<T>(
    worker: &str,
    joined: Result<T, JoinError>,
    policy: PanicPolicy,
) -> Recovered<T> {
    match joined {
        Ok(value) => Recovered::Completed(value),
        Err(e) if e.is_panic() => {
            policy.handle(worker, e.into_panic());
            Recovered::Panicked
        }
        Err(_) => Recovered::Cancelled,
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
