//! Topic-backed source.
//!
//! Every partition of the topic gets its own pair of workers under one
//! cancellation scope: a record forwarder feeding the shared queue and an
//! error forwarder feeding the progress stream. The partition set is fixed
//! when the source is built; there is no consumer-group rebalancing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    message_queue, progress_stream, Message, MessageReceiver, MessageSender, Outcome,
    ProgressSender, ProgressStream, Source,
};
use crate::error::{ClientError, Result};

/// Per-partition consumption handle.
///
/// Records and partition-level errors arrive on separate streams. Both
/// streams close after [`PartitionFeed::close`] once the producing side has
/// stopped.
pub struct PartitionFeed {
    records: mpsc::Receiver<Message>,
    errors: mpsc::Receiver<ClientError>,
    closed: CancellationToken,
}

/// Producing side of a [`PartitionFeed`].
pub struct FeedHandle {
    pub records: mpsc::Sender<Message>,
    pub errors: mpsc::Sender<ClientError>,
    /// Fires when the consumer of the feed asks it to close.
    pub closed: CancellationToken,
}

impl PartitionFeed {
    /// Create a connected feed with the given buffer per stream.
    pub fn channel(capacity: usize) -> (FeedHandle, PartitionFeed) {
        let (records_tx, records_rx) = mpsc::channel(capacity.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        (
            FeedHandle {
                records: records_tx,
                errors: errors_tx,
                closed: closed.clone(),
            },
            PartitionFeed {
                records: records_rx,
                errors: errors_rx,
                closed,
            },
        )
    }

    /// Ask the producing side to stop without waiting for it.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// Consumption of single partitions of one topic.
#[async_trait]
pub trait PartitionConsumer: Send + Sync {
    /// Start consuming `partition` from the newest offset.
    async fn consume(&self, partition: i32) -> Result<PartitionFeed>;
}

/// Source that consumes a fixed set of partitions of a topic.
pub struct KafkaSource {
    consumer: Arc<dyn PartitionConsumer>,
    partitions: Vec<i32>,
    messages_tx: MessageSender,
    messages_rx: Option<MessageReceiver>,
    progress_tx: ProgressSender,
    progress_rx: Option<ProgressStream>,
}

impl KafkaSource {
    /// Create a source over `partitions`.
    ///
    /// Queue capacity equals the partition count so no forwarder starves
    /// waiting for another.
    pub fn new(consumer: Arc<dyn PartitionConsumer>, partitions: Vec<i32>) -> Self {
        let (messages_tx, messages_rx) = message_queue(partitions.len());
        let (progress_tx, progress_rx) = progress_stream(partitions.len());
        Self {
            consumer,
            partitions,
            messages_tx,
            messages_rx: Some(messages_rx),
            progress_tx,
            progress_rx: Some(progress_rx),
        }
    }
}

#[async_trait]
impl Source for KafkaSource {
    fn messages(&mut self) -> Option<MessageReceiver> {
        self.messages_rx.take()
    }

    fn progress(&mut self) -> Option<ProgressStream> {
        self.progress_rx.take()
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()> {
        let KafkaSource {
            consumer,
            partitions,
            messages_tx,
            progress_tx,
            ..
        } = *self;

        let scope = cancel.child_token();
        let mut workers = JoinSet::new();
        for partition in partitions {
            workers.spawn(consume_partition(
                Arc::clone(&consumer),
                partition,
                messages_tx.clone(),
                progress_tx.clone(),
                scope.clone(),
            ));
        }

        // Streams close once the last partition worker drops its senders
        drop(messages_tx);
        drop(progress_tx);

        // First failing partition stops the others
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined
                .unwrap_or_else(|e| Err(ClientError::task("kafka partition", e.to_string())));
            if let Err(e) = result {
                scope.cancel();
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "kafka source"
    }
}

/// Consume one partition until the scope is cancelled.
async fn consume_partition(
    consumer: Arc<dyn PartitionConsumer>,
    partition: i32,
    messages: MessageSender,
    progress: ProgressSender,
    cancel: CancellationToken,
) -> Result<()> {
    let PartitionFeed {
        records,
        errors,
        closed,
    } = consumer.consume(partition).await?;
    debug!("consuming partition {}", partition);

    let record_forwarder = tokio::spawn(forward_records(records, messages, cancel.clone()));
    let error_forwarder = tokio::spawn(forward_errors(errors, progress));

    // Close the partition first, then wait for both forwarders
    cancel.cancelled().await;
    closed.cancel();
    let forwarded = record_forwarder.await.unwrap_or_default();
    let _ = error_forwarder.await;

    debug!(
        "partition {} stopped after {} messages",
        partition, forwarded
    );
    Ok(())
}

async fn forward_records(
    mut records: mpsc::Receiver<Message>,
    messages: MessageSender,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0;
    while let Some(message) = records.recv().await {
        tokio::select! {
            sent = messages.send(message) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
        forwarded += 1;
    }
    forwarded
}

async fn forward_errors(mut errors: mpsc::Receiver<ClientError>, progress: ProgressSender) {
    while let Some(e) = errors.recv().await {
        if progress.send(Outcome::failure(e)).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    type Handles = Arc<Mutex<HashMap<i32, FeedHandle>>>;

    /// In-memory partitions fed by the test through their handles.
    ///
    /// A handle is dropped as soon as its feed is closed, which ends both
    /// streams once the test has dropped its own sender clones.
    #[derive(Default)]
    struct FakeConsumer {
        handles: Handles,
        missing: Vec<i32>,
    }

    impl FakeConsumer {
        async fn senders(
            &self,
            partition: i32,
        ) -> (mpsc::Sender<Message>, mpsc::Sender<ClientError>) {
            let handles = self.handles.lock().await;
            let handle = &handles[&partition];
            (handle.records.clone(), handle.errors.clone())
        }

        async fn wait_for_partitions(&self, count: usize) {
            for _ in 0..200 {
                if self.handles.lock().await.len() == count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("partitions were not consumed");
        }
    }

    #[async_trait]
    impl PartitionConsumer for FakeConsumer {
        async fn consume(&self, partition: i32) -> Result<PartitionFeed> {
            if self.missing.contains(&partition) {
                return Err(ClientError::Config(format!("no partition {}", partition)));
            }
            let (handle, feed) = PartitionFeed::channel(4);
            let closed = handle.closed.clone();
            self.handles.lock().await.insert(partition, handle);

            let handles = Arc::clone(&self.handles);
            tokio::spawn(async move {
                closed.cancelled().await;
                handles.lock().await.remove(&partition);
            });
            Ok(feed)
        }
    }

    #[tokio::test]
    async fn test_queue_capacity_matches_partitions() {
        let consumer = Arc::new(FakeConsumer::default());
        let source = KafkaSource::new(consumer, vec![0, 1, 2]);
        assert_eq!(source.partitions, vec![0, 1, 2]);
        assert_eq!(source.messages_tx.max_capacity(), 3);
    }

    #[tokio::test]
    async fn test_fan_in_records_and_errors() {
        let consumer = Arc::new(FakeConsumer::default());
        let mut source = Box::new(KafkaSource::new(consumer.clone(), vec![0, 1]));
        let mut messages = source.messages().unwrap();
        let mut progress = source.progress().unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn(source.run(cancel.clone()));
        consumer.wait_for_partitions(2).await;

        let (records0, errors0) = consumer.senders(0).await;
        let (records1, errors1) = consumer.senders(1).await;
        records0.send(Message::keyed("p0", "a")).await.unwrap();
        records0.send(Message::keyed("p0", "b")).await.unwrap();
        records1.send(Message::keyed("p1", "c")).await.unwrap();
        errors1
            .send(ClientError::Decode("partition 1 hiccup".into()))
            .await
            .unwrap();

        let mut from_p0 = Vec::new();
        let mut from_p1 = Vec::new();
        for _ in 0..3 {
            let message = messages.recv().await.unwrap();
            match message.key() {
                Some(b"p0") => from_p0.push(message.value().to_vec()),
                _ => from_p1.push(message.value().to_vec()),
            }
        }
        // Order is kept within a partition only
        assert_eq!(from_p0, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(from_p1, vec![b"c".to_vec()]);

        match progress.recv().await {
            Some(Outcome::Failure(e)) => assert!(e.to_string().contains("hiccup")),
            other => panic!("expected partition error, got {:?}", other),
        }

        drop((records0, errors0, records1, errors1));
        cancel.cancel();

        timeout(Duration::from_secs(1), run)
            .await
            .expect("source should stop after cancellation")
            .unwrap()
            .unwrap();
        assert_eq!(messages.recv().await, None);
        assert!(progress.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_queue_full() {
        let consumer = Arc::new(FakeConsumer::default());
        let mut source = Box::new(KafkaSource::new(consumer.clone(), vec![0]));
        let mut messages = source.messages().unwrap();
        let _progress = source.progress().unwrap();

        let cancel = CancellationToken::new();
        let run = tokio::spawn(source.run(cancel.clone()));
        consumer.wait_for_partitions(1).await;

        // Queue capacity is one, so the second forward blocks
        let (records, errors) = consumer.senders(0).await;
        for i in 0..3 {
            records
                .send(Message::from_value(format!("m{}", i)))
                .await
                .unwrap();
        }
        drop((records, errors));
        tokio::time::sleep(Duration::from_millis(20)).await;

        cancel.cancel();
        timeout(Duration::from_secs(1), run)
            .await
            .expect("blocked forwarder should observe cancellation")
            .unwrap()
            .unwrap();
        assert_eq!(messages.recv().await, Some(Message::from_value("m0")));
        assert_eq!(messages.recv().await, None);
    }

    #[tokio::test]
    async fn test_failed_partition_fails_source() {
        let consumer = Arc::new(FakeConsumer {
            missing: vec![1],
            ..Default::default()
        });
        let mut source = Box::new(KafkaSource::new(consumer.clone(), vec![0, 1]));
        let mut messages = source.messages().unwrap();
        let _progress = source.progress().unwrap();

        let err = timeout(Duration::from_secs(1), source.run(CancellationToken::new()))
            .await
            .expect("source should stop when a partition fails")
            .unwrap_err();
        assert!(err.to_string().contains("no partition 1"));
        assert_eq!(messages.recv().await, None);
    }
}
