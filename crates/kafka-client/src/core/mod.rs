//! Core abstractions for the transfer pipeline.
//!
//! This module provides the foundational types and traits used throughout
//! the pipeline:
//!
//! - [`message`]: The record moved between source and sink, and the
//!   per-record [`Outcome`] reported on progress streams
//! - [`traits`]: The [`Source`] and [`Sink`] capabilities
//!
//! # Architecture
//!
//! A source pushes [`Message`]s onto a bounded queue that is drained by a
//! sink. Both report one [`Outcome`] per processed record on their own
//! progress stream, which the reporter merges into periodic statistics.
//! Every channel has exactly one owning writer; a stream is closed when
//! its last sender is dropped.

pub mod message;
pub mod traits;

// Re-export commonly used types for convenience
pub use message::{
    message_queue, progress_stream, Message, MessageReceiver, MessageSender, Outcome,
    ProgressSender, ProgressStream,
};
pub use traits::{Sink, Source};
