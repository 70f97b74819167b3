//! Kafka cluster access built on rdkafka.
//!
//! A [`KafkaCluster`] is connected once per command. It fetches cluster
//! metadata up front so topic checks and partition listing never go back
//! to the brokers, and builds the consumer and producer used by the
//! pipeline from the same client settings.

mod consumer;
mod producer;

pub use consumer::KafkaPartitionConsumer;
pub use producer::KafkaProducer;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Timeout of the initial metadata request.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the producer tries to deliver one message.
const MESSAGE_TIMEOUT_MS: &str = "5000";

/// Client identity and pass-through settings shared by every connection.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub client_id: String,
    /// librdkafka properties applied after the defaults.
    pub properties: BTreeMap<String, String>,
}

/// Connected cluster with a snapshot of its topics.
pub struct KafkaCluster {
    brokers: String,
    config: ClientConfig,
    topics: HashMap<String, Vec<i32>>,
}

impl KafkaCluster {
    /// Connect to `brokers` and load the cluster metadata.
    pub async fn connect(brokers: &[String], settings: &ClientSettings) -> Result<Self> {
        let brokers = brokers.join(",");
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &brokers)
            .set("client.id", &settings.client_id);
        for (key, value) in &settings.properties {
            config.set(key, value);
        }

        let probe: BaseConsumer = config.create()?;
        let metadata = tokio::task::spawn_blocking(move || {
            probe
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .filter(|topic| topic.error().is_none())
                        .map(|topic| {
                            let partitions = topic.partitions().iter().map(|p| p.id()).collect();
                            (topic.name().to_string(), partitions)
                        })
                        .collect::<HashMap<String, Vec<i32>>>()
                })
        })
        .await
        .map_err(|e| ClientError::task("kafka metadata", e.to_string()))??;

        info!(
            "connected to cluster {} ({} topics)",
            brokers,
            metadata.len()
        );
        Ok(Self {
            brokers,
            config,
            topics: metadata,
        })
    }

    /// Comma separated broker list of this cluster.
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    pub fn topic_exists(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Fail with the missing-topic error unless `topic` exists.
    ///
    /// `role` names the cluster in the error, e.g. "source"; empty for none.
    pub fn ensure_topic(&self, topic: &str, role: &str) -> Result<()> {
        if self.topic_exists(topic) {
            Ok(())
        } else {
            Err(ClientError::topic_not_found(topic, role))
        }
    }

    /// Partition ids of `topic`, in ascending order.
    pub fn partitions(&self, topic: &str) -> Result<Vec<i32>> {
        let mut partitions = self
            .topics
            .get(topic)
            .cloned()
            .ok_or_else(|| ClientError::topic_not_found(topic, ""))?;
        partitions.sort_unstable();
        Ok(partitions)
    }

    /// Build a consumer assigned to every partition of `topic` at the newest
    /// offset.
    pub fn consumer(&self, topic: &str) -> Result<KafkaPartitionConsumer> {
        let partitions = self.partitions(topic)?;
        let mut config = self.config.clone();
        config
            .set("group.id", self.config.get("client.id").unwrap_or("kafka-client"))
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");
        debug!("assigning {} partitions of {}", partitions.len(), topic);
        KafkaPartitionConsumer::assign(&config, topic, &partitions)
    }

    pub fn producer(&self) -> Result<KafkaProducer> {
        let mut config = self.config.clone();
        if config.get("message.timeout.ms").is_none() {
            config.set("message.timeout.ms", MESSAGE_TIMEOUT_MS);
        }
        KafkaProducer::new(&config)
    }
}

impl std::fmt::Debug for KafkaCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaCluster")
            .field("brokers", &self.brokers)
            .field("topics", &self.topics.len())
            .finish()
    }
}

/// Split a comma separated broker list, dropping empty entries.
pub fn split_brokers(brokers: &str) -> Vec<String> {
    brokers
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(topics: &[(&str, &[i32])]) -> KafkaCluster {
        KafkaCluster {
            brokers: "localhost:9092".into(),
            config: ClientConfig::new(),
            topics: topics
                .iter()
                .map(|(name, partitions)| (name.to_string(), partitions.to_vec()))
                .collect(),
        }
    }

    #[test]
    fn test_split_brokers() {
        assert_eq!(
            split_brokers("a:9092, b:9092,,c:9092 "),
            vec!["a:9092", "b:9092", "c:9092"]
        );
        assert!(split_brokers("").is_empty());
    }

    #[test]
    fn test_ensure_topic() {
        let cluster = cluster(&[("orders", &[0, 1])]);
        assert!(cluster.ensure_topic("orders", "source").is_ok());

        let err = cluster.ensure_topic("payments", "destination").unwrap_err();
        assert_eq!(
            err.to_string(),
            "kafka: topic payments does not exist in destination cluster"
        );
    }

    #[test]
    fn test_partitions_sorted() {
        let cluster = cluster(&[("orders", &[2, 0, 1])]);
        assert_eq!(cluster.partitions("orders").unwrap(), vec![0, 1, 2]);
        assert!(cluster.partitions("missing").is_err());
    }
}
