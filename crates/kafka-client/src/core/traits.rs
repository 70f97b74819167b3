//! Source and sink capabilities.
//!
//! - [`Source`]: Produces messages onto the queue and outcomes onto its
//!   progress stream until exhausted or cancelled
//! - [`Sink`]: Drains the queue and reports one outcome per message
//!
//! Channel read ends are handed out once; the component keeps the write
//! ends and closes them by dropping them when its `run` returns.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

use super::message::{MessageReceiver, ProgressStream};

/// Produce messages from an external origin.
#[async_trait]
pub trait Source: Send {
    /// Take the read end of the message queue.
    ///
    /// Returns `None` once the receiver has been taken.
    fn messages(&mut self) -> Option<MessageReceiver>;

    /// Take the read end of the progress stream.
    fn progress(&mut self) -> Option<ProgressStream>;

    /// Run until the origin is exhausted or `cancel` fires.
    ///
    /// The message queue and the progress stream are closed exactly once,
    /// when this future completes.
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()>;

    /// Short name used in logs and task errors.
    fn name(&self) -> &'static str;
}

/// Deliver messages to an external destination.
#[async_trait]
pub trait Sink: Send {
    /// Take the read end of the progress stream.
    fn progress(&mut self) -> Option<ProgressStream>;

    /// Drain the message queue until it closes.
    ///
    /// Cancellation never drops the queue: buffered messages are still
    /// drained, but waits that only pace delivery end early. The progress
    /// stream is closed when this future completes, whether it returns an
    /// error or not.
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()>;

    /// Short name used in logs and task errors.
    fn name(&self) -> &'static str;
}
