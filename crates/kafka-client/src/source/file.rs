//! File-backed source.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    message_queue, progress_stream, MessageReceiver, MessageSender, Outcome, ProgressSender,
    ProgressStream, Source,
};
use crate::error::Result;
use crate::format::RecordReader;
use crate::recover::{recover, PanicPolicy, Recovered};

/// Default capacity of the queue between a file source and its sink.
pub const FILE_QUEUE_CAPACITY: usize = 1;

/// Source that decodes one message at a time with a [`RecordReader`].
///
/// The decode loop runs as a supervised worker: a panic while decoding stops
/// the source as if the input had ended.
pub struct FileSource {
    reader: Box<dyn RecordReader>,
    messages_tx: MessageSender,
    messages_rx: Option<MessageReceiver>,
    progress_tx: ProgressSender,
    progress_rx: Option<ProgressStream>,
    panic_policy: PanicPolicy,
}

impl FileSource {
    /// Create a file source with the default queue capacity.
    pub fn new(reader: Box<dyn RecordReader>) -> Self {
        Self::with_capacity(reader, FILE_QUEUE_CAPACITY)
    }

    /// Create a file source with a custom queue capacity.
    pub fn with_capacity(reader: Box<dyn RecordReader>, capacity: usize) -> Self {
        let (messages_tx, messages_rx) = message_queue(capacity);
        let (progress_tx, progress_rx) = progress_stream(1);
        Self {
            reader,
            messages_tx,
            messages_rx: Some(messages_rx),
            progress_tx,
            progress_rx: Some(progress_rx),
            panic_policy: PanicPolicy::default(),
        }
    }

    /// Set how a panic inside the decode loop is handled.
    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }
}

#[async_trait]
impl Source for FileSource {
    fn messages(&mut self) -> Option<MessageReceiver> {
        self.messages_rx.take()
    }

    fn progress(&mut self) -> Option<ProgressStream> {
        self.progress_rx.take()
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()> {
        let FileSource {
            reader,
            messages_tx,
            progress_tx,
            panic_policy,
            ..
        } = *self;

        // The worker owns both write ends, so they close when it is done
        let mut worker = tokio::spawn(read_loop(reader, messages_tx, progress_tx, cancel.clone()));

        tokio::select! {
            joined = &mut worker => match recover("file source", joined, panic_policy) {
                Recovered::Completed(count) => debug!("file source finished after {} messages", count),
                Recovered::Panicked => debug!("file source stopped after a panic in the decode loop"),
                Recovered::Cancelled => debug!("file source worker aborted"),
            },
            _ = cancel.cancelled() => {
                worker.abort();
                let _ = worker.await;
                debug!("file source cancelled");
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "file source"
    }
}

/// Decode messages until end of stream, a decode error, or cancellation.
async fn read_loop(
    mut reader: Box<dyn RecordReader>,
    messages: MessageSender,
    progress: ProgressSender,
    cancel: CancellationToken,
) -> u64 {
    let mut count = 0;
    loop {
        let message = match reader.read().await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                tokio::select! {
                    _ = progress.send(Outcome::failure(e)) => {}
                    _ = cancel.cancelled() => {}
                }
                break;
            }
        };

        // A full queue must not outlive cancellation
        tokio::select! {
            sent = messages.send(message) => {
                if sent.is_err() {
                    debug!("message queue closed by the sink");
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
        count += 1;
    }
    count
}
