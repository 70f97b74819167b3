//! Partition consumption over one rdkafka stream consumer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, DefaultConsumerContext, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::core::Message;
use crate::error::{ClientError, Result};
use crate::source::{FeedHandle, PartitionConsumer, PartitionFeed};

type PartitionQueue = rdkafka::consumer::stream_consumer::StreamPartitionQueue<DefaultConsumerContext>;

/// Consumer with one split queue per assigned partition.
///
/// Partitions are assigned directly, starting from the newest offset; the
/// group id is never used to join a consumer group. The main consumer
/// queue is served by a background task for as long as this value lives.
pub struct KafkaPartitionConsumer {
    topic: String,
    queues: Mutex<HashMap<i32, PartitionQueue>>,
    _driver: DropGuard,
}

impl KafkaPartitionConsumer {
    pub(super) fn assign(config: &ClientConfig, topic: &str, partitions: &[i32]) -> Result<Self> {
        let consumer: Arc<StreamConsumer> = Arc::new(config.create()?);

        let mut assignment = TopicPartitionList::new();
        for &partition in partitions {
            assignment.add_partition_offset(topic, partition, Offset::End)?;
        }
        consumer.assign(&assignment)?;

        let mut queues = HashMap::with_capacity(partitions.len());
        for &partition in partitions {
            let queue = consumer
                .split_partition_queue(topic, partition)
                .ok_or_else(|| {
                    ClientError::Config(format!(
                        "cannot split queue of partition {} of {}",
                        partition, topic
                    ))
                })?;
            queues.insert(partition, queue);
        }

        let stop = CancellationToken::new();
        tokio::spawn(drive(consumer, stop.clone()));

        Ok(Self {
            topic: topic.to_string(),
            queues: Mutex::new(queues),
            _driver: stop.drop_guard(),
        })
    }
}

#[async_trait]
impl PartitionConsumer for KafkaPartitionConsumer {
    async fn consume(&self, partition: i32) -> Result<PartitionFeed> {
        let queue = self.queues.lock().await.remove(&partition).ok_or_else(|| {
            ClientError::Config(format!(
                "partition {} of {} is not assigned or already consumed",
                partition, self.topic
            ))
        })?;

        let (handle, feed) = PartitionFeed::channel(1);
        tokio::spawn(pump(queue, handle));
        Ok(feed)
    }
}

/// Serve the main consumer queue. Partition queues only receive records
/// while it is polled.
async fn drive(consumer: Arc<StreamConsumer>, stop: CancellationToken) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            received = consumer.recv() => match received {
                Ok(message) => debug!(
                    "unexpected record on main queue from partition {}",
                    message.partition()
                ),
                Err(e) => warn!("kafka consumer error: {}", e),
            },
        }
    }
}

/// Copy records of one partition queue into its feed until the feed closes.
async fn pump(queue: PartitionQueue, handle: FeedHandle) {
    let FeedHandle {
        records,
        errors,
        closed,
    } = handle;

    loop {
        let received = tokio::select! {
            _ = closed.cancelled() => break,
            received = queue.recv() => received.map(|record| {
                Message::new(
                    record.key().map(Bytes::copy_from_slice),
                    Bytes::copy_from_slice(record.payload().unwrap_or_default()),
                )
            }),
        };

        let delivered = match received {
            Ok(message) => tokio::select! {
                _ = closed.cancelled() => break,
                sent = records.send(message) => sent.is_ok(),
            },
            Err(e) => errors.send(ClientError::Kafka(e)).await.is_ok(),
        };
        if !delivered {
            break;
        }
    }
}
