//! Message sources.
//!
//! - [`FileSource`]: Decodes messages from a file or stdin
//! - [`KafkaSource`]: Consumes every partition of a topic from the newest offset
//!
//! Sources only report failures on their progress stream; successfully
//! delivered records are counted by the sink.

mod file;
mod kafka;

pub use file::FileSource;
pub use kafka::{FeedHandle, KafkaSource, PartitionConsumer, PartitionFeed};
