//! Message production over an rdkafka future producer.

use std::time::Duration;

use futures::future;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};

use crate::core::Message;
use crate::error::{ClientError, Result};
use crate::sink::{Delivery, RecordProducer};

/// Time allowed to deliver buffered messages when flushing.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer handing each message to librdkafka's internal queue.
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub(super) fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            producer: config.create()?,
        })
    }
}

impl RecordProducer for KafkaProducer {
    fn send(&self, topic: &str, message: &Message) -> Delivery {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(message.value());
        if let Some(key) = message.key() {
            record = record.key(key);
        }

        match self.producer.send_result(record) {
            Ok(delivery) => {
                let topic = topic.to_string();
                Box::pin(async move {
                    match delivery.await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err((e, _))) => Err(ClientError::Kafka(e)),
                        Err(_) => Err(ClientError::DeliveryCancelled { topic }),
                    }
                })
            }
            // Queue full or invalid record
            Err((e, _)) => Box::pin(future::ready(Err(ClientError::Kafka(e)))),
        }
    }

    fn flush(&self) -> Delivery {
        let producer = self.producer.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT))
                .await
                .map_err(|e| ClientError::task("kafka flush", e.to_string()))??;
            Ok(())
        })
    }
}
