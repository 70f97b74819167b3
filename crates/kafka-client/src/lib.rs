//! # kafka-client
//!
//! Concurrent transfer pipeline between files and Kafka topics.
//!
//! A pipeline moves opaque key/value records from one source to one sink
//! through a bounded queue:
//!
//! - **Sources** read a file or stdin, or consume every partition of a topic
//! - **Sinks** write a file or stdout, or produce to a topic at a paced rate
//! - **Reporting** merges per-record outcomes into throughput lines and a
//!   final summary
//! - **Cancellation** by interrupt or run duration winds every component
//!   down cleanly
//!
//! ## Example
//!
//! ```rust,no_run
//! use kafka_client::{
//!     open_input, Config, FileSource, Format, KafkaCluster, KafkaSink, Pacer, Pipeline,
//!     Reporter, Source,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn produce() -> kafka_client::Result<()> {
//! let config = Config::discover(None)?;
//! let cluster = KafkaCluster::connect(&config.brokers("local")?, &config.client_settings()).await?;
//! cluster.ensure_topic("orders", "")?;
//!
//! let input = open_input(None).await?;
//! let mut source = Box::new(FileSource::new(Format::Text.reader(input)));
//! let messages = source.messages().expect("fresh source");
//! let sink = Box::new(KafkaSink::new(
//!     messages,
//!     Arc::new(cluster.producer()?),
//!     "orders",
//!     Pacer::new(config.period),
//! ));
//!
//! let result = Pipeline::new(source, sink, Reporter::new(config.reporting_period()))
//!     .run(CancellationToken::new())
//!     .await?;
//! println!("Produced {} messages", result.successes);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod kafka;
pub mod orchestrator;
pub mod pacer;
pub mod recover;
pub mod report;
pub mod sink;
pub mod source;
pub mod stream;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use crate::core::{Message, Outcome, Sink, Source};
pub use config::Config;
pub use error::{ClientError, Result};
pub use format::{Format, RecordReader, RecordWriter};
pub use kafka::{ClientSettings, KafkaCluster, KafkaPartitionConsumer, KafkaProducer};
pub use orchestrator::{Pipeline, PipelineResult};
pub use pacer::Pacer;
pub use recover::PanicPolicy;
pub use report::{ReportSummary, Reporter};
pub use sink::{FileSink, KafkaSink, RecordProducer};
pub use source::{FileSource, KafkaSource, PartitionConsumer};
pub use stream::{create_output, open_input};
