//! Topic-backed sink.
//!
//! Two duties share one producer handle. The produce duty runs as its own
//! task: it waits for the pacer before each message and hands the
//! message to the producer, forwarding the pending acknowledgement. The
//! acknowledgement duty runs inside [`Sink::run`] and resolves those
//! acknowledgements in whatever order the producer completes them. The sink
//! is finished once the produce duty has stopped and every acknowledgement
//! has been reported.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{
    progress_stream, Message, MessageReceiver, Outcome, ProgressSender, ProgressStream, Sink,
};
use crate::error::{ClientError, Result};
use crate::pacer::Pacer;

/// Maximum number of submitted messages awaiting hand-off to the
/// acknowledgement duty.
pub const PRODUCER_BUFFER: usize = 256;

/// Pending acknowledgement of one produced message.
pub type Delivery = BoxFuture<'static, Result<()>>;

/// Asynchronous producer of single messages.
pub trait RecordProducer: Send + Sync {
    /// Enqueue `message` for `topic`.
    ///
    /// Enqueueing never waits for the broker; the returned future resolves
    /// once the message is acknowledged or has failed. A message without a
    /// key is produced without one.
    fn send(&self, topic: &str, message: &Message) -> Delivery;

    /// Wait for every enqueued message to leave the producer.
    fn flush(&self) -> Delivery {
        Box::pin(future::ready(Ok(())))
    }
}

/// Sink that produces messages to one topic.
pub struct KafkaSink {
    messages: MessageReceiver,
    producer: Arc<dyn RecordProducer>,
    topic: String,
    pacer: Pacer,
    progress_tx: ProgressSender,
    progress_rx: Option<ProgressStream>,
}

impl KafkaSink {
    pub fn new(
        messages: MessageReceiver,
        producer: Arc<dyn RecordProducer>,
        topic: impl Into<String>,
        pacer: Pacer,
    ) -> Self {
        let (progress_tx, progress_rx) = progress_stream(1);
        Self {
            messages,
            producer,
            topic: topic.into(),
            pacer,
            progress_tx,
            progress_rx: Some(progress_rx),
        }
    }
}

#[async_trait]
impl Sink for KafkaSink {
    fn progress(&mut self) -> Option<ProgressStream> {
        self.progress_rx.take()
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()> {
        let KafkaSink {
            messages,
            producer,
            topic,
            pacer,
            progress_tx: progress,
            ..
        } = *self;

        let (deliveries_tx, mut deliveries) = mpsc::channel(PRODUCER_BUFFER);
        let produce_duty = tokio::spawn(produce(
            messages,
            producer.clone(),
            topic,
            pacer,
            deliveries_tx,
            cancel,
        ));

        let mut pending = FuturesUnordered::new();
        let mut accepting = true;
        let (mut acked, mut failed) = (0u64, 0u64);
        loop {
            tokio::select! {
                delivery = deliveries.recv(), if accepting => match delivery {
                    Some(delivery) => pending.push(delivery),
                    None => accepting = false,
                },
                Some(result) = pending.next(), if !pending.is_empty() => {
                    let outcome = Outcome::from(result);
                    if outcome.is_success() {
                        acked += 1;
                    } else {
                        failed += 1;
                    }
                    // Keep resolving deliveries even if nobody is listening
                    let _ = progress.send(outcome).await;
                }
                else => break,
            }
        }

        let submitted = produce_duty
            .await
            .map_err(|e| ClientError::task("kafka produce", e.to_string()))?;
        if let Err(e) = producer.flush().await {
            warn!("failed to flush producer: {}", e);
        }
        debug!(
            "kafka sink finished: {} submitted, {} acknowledged, {} failed",
            submitted, acked, failed
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "kafka sink"
    }
}

/// Submit every queued message, paced, until the queue closes.
async fn produce(
    mut messages: MessageReceiver,
    producer: Arc<dyn RecordProducer>,
    topic: String,
    mut pacer: Pacer,
    deliveries: mpsc::Sender<Delivery>,
    cancel: CancellationToken,
) -> u64 {
    let mut submitted = 0;
    while let Some(message) = messages.recv().await {
        // Once cancelled, drain what is left without waiting
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = pacer.ready() => {}
        }

        let delivery = producer.send(&topic, &message);
        if deliveries.send(delivery).await.is_err() {
            break;
        }
        submitted += 1;
    }
    pacer.stop();
    submitted
}
