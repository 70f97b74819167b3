//! Message sinks.
//!
//! - [`FileSink`]: Encodes messages onto a file or stdout, failing fast
//! - [`KafkaSink`]: Produces messages to a topic, paced, reporting
//!   acknowledgements as they arrive

mod file;
mod kafka;

pub use file::FileSink;
pub use kafka::{Delivery, KafkaSink, RecordProducer, PRODUCER_BUFFER};
