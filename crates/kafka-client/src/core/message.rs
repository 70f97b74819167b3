//! Record and outcome types carried by the pipeline channels.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// A single record moving from a source to a sink.
///
/// Keys are optional: an empty key is normalised to `None` so sinks can
/// omit it rather than send an empty key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    key: Option<Bytes>,
    value: Bytes,
}

impl Message {
    /// Create a message from an optional key and a value.
    pub fn new(key: Option<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
            value: value.into(),
        }
    }

    /// Create a message without a key.
    pub fn from_value(value: impl Into<Bytes>) -> Self {
        Self::new(None, value)
    }

    /// Create a keyed message.
    pub fn keyed(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::new(Some(key.into()), value)
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// Result of processing one record, or terminal failure of a component.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success,
    Failure(Arc<ClientError>),
}

impl Outcome {
    /// Wrap an error as a failure outcome.
    pub fn failure(err: ClientError) -> Self {
        Outcome::Failure(Arc::new(err))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<std::result::Result<(), ClientError>> for Outcome {
    fn from(result: std::result::Result<(), ClientError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failure(e),
        }
    }
}

/// Write end of the message queue, owned by the source.
pub type MessageSender = mpsc::Sender<Message>;

/// Read end of the message queue, owned by the sink.
pub type MessageReceiver = mpsc::Receiver<Message>;

/// Write end of a progress stream.
pub type ProgressSender = mpsc::Sender<Outcome>;

/// Read end of a progress stream, consumed by the reporter.
pub type ProgressStream = mpsc::Receiver<Outcome>;

/// Create the bounded queue between a source and a sink.
///
/// tokio channels cannot be unbuffered, so capacity is at least one.
pub fn message_queue(capacity: usize) -> (MessageSender, MessageReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Create a progress stream.
pub fn progress_stream(capacity: usize) -> (ProgressSender, ProgressStream) {
    mpsc::channel(capacity.max(1))
}
