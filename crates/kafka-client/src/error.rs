//! Error types for the transfer pipeline.

use std::sync::Arc;

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client error (connection, metadata, consume or produce)
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The requested topic is not known to the cluster
    #[error("kafka: topic {topic} does not exist{location}")]
    TopicNotFound { topic: String, location: String },

    /// More than one record format was requested
    #[error("too many formats, expected only one format: raw or text")]
    TooManyFormats,

    /// A record could not be decoded from the input stream
    #[error("Decode error: {0}")]
    Decode(String),

    /// The producer dropped a message before acknowledging it
    #[error("Delivery of message to {topic} was cancelled before acknowledgement")]
    DeliveryCancelled { topic: String },

    /// A pipeline task panicked or could not be joined
    #[error("Task {task} failed: {message}")]
    Task { task: String, message: String },

    /// A record failure that was also reported on a progress stream
    #[error(transparent)]
    Reported(Arc<ClientError>),

    /// IO error (file and stream operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The run was stopped by an operator interrupt (SIGINT, SIGTERM)
    #[error("interrupted by user")]
    Interrupted,
}

impl ClientError {
    /// Create a TopicNotFound error, `location` names the cluster role if any.
    pub fn topic_not_found(topic: impl Into<String>, location: impl Into<String>) -> Self {
        let location = location.into();
        ClientError::TopicNotFound {
            topic: topic.into(),
            location: if location.is_empty() {
                location
            } else {
                format!(" in {} cluster", location)
            },
        }
    }

    /// Create a Task error
    pub fn task(task: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Task {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            ClientError::Config(_)
            | ClientError::Yaml(_)
            | ClientError::TooManyFormats
            | ClientError::TopicNotFound { .. } => 2,
            ClientError::Interrupted => 130,
            ClientError::Reported(inner) => inner.exit_code(),
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Transparent wrappers already print their inner error
        let mut source = match self {
            ClientError::Reported(inner) => std::error::Error::source(inner.as_ref()),
            _ => std::error::Error::source(self),
        };
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_not_found_message() {
        let err = ClientError::topic_not_found("orders", "");
        assert_eq!(err.to_string(), "kafka: topic orders does not exist");

        let err = ClientError::topic_not_found("orders", "source");
        assert_eq!(
            err.to_string(),
            "kafka: topic orders does not exist in source cluster"
        );
    }

    #[test]
    fn test_reported_is_transparent() {
        let inner = Arc::new(ClientError::Decode("truncated key".into()));
        let err = ClientError::Reported(inner);
        assert_eq!(err.to_string(), "Decode error: truncated key");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ClientError::Interrupted.exit_code(), 130);
        assert_eq!(ClientError::TooManyFormats.exit_code(), 2);
        assert_eq!(ClientError::Config("x".into()).exit_code(), 2);
        assert_eq!(ClientError::Decode("x".into()).exit_code(), 1);
        let reported = ClientError::Reported(Arc::new(ClientError::Config("x".into())));
        assert_eq!(reported.exit_code(), 2);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = ClientError::Reported(Arc::new(ClientError::Io(io)));
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: pipe closed"));
    }
}
