//! Record formats for file-backed sources and sinks.
//!
//! - [`RecordReader`]: Decodes one [`Message`] at a time from a byte stream
//! - [`RecordWriter`]: Encodes messages onto a byte stream
//! - [`Format`]: Selects the raw or text encoding
//!
//! The pipeline treats payloads as opaque; formats only frame them.

mod raw;
mod text;

pub use raw::{RawReader, RawWriter};
pub use text::{TextReader, TextWriter};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::core::Message;
use crate::error::{ClientError, Result};

/// Buffered input byte stream.
pub type InputStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Output byte stream.
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Decode messages from a byte stream.
#[async_trait]
pub trait RecordReader: Send {
    /// Read the next message.
    ///
    /// Returns `Ok(None)` at a clean end of stream. End of stream in the
    /// middle of a record is an error.
    async fn read(&mut self) -> Result<Option<Message>>;
}

/// Encode messages onto a byte stream.
#[async_trait]
pub trait RecordWriter: Send {
    /// Write one message.
    async fn write(&mut self, message: &Message) -> Result<()>;

    /// Flush buffered output to the underlying stream.
    async fn flush(&mut self) -> Result<()>;
}

/// Record encoding of a file or standard stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Length-prefixed binary key and value.
    Raw,
    /// One value per line.
    Text,
}

impl Format {
    /// Pick the format from the requested flags.
    ///
    /// At most one format may be requested. Without a request, named files
    /// default to raw and standard streams to text.
    pub fn select(raw: bool, text: bool, has_file: bool) -> Result<Self> {
        match (raw, text) {
            (true, true) => Err(ClientError::TooManyFormats),
            (true, false) => Ok(Format::Raw),
            (false, true) => Ok(Format::Text),
            (false, false) if has_file => Ok(Format::Raw),
            (false, false) => Ok(Format::Text),
        }
    }

    /// Create a reader decoding this format.
    pub fn reader(self, input: InputStream) -> Box<dyn RecordReader> {
        match self {
            Format::Raw => Box::new(RawReader::new(input)),
            Format::Text => Box::new(TextReader::new(input)),
        }
    }

    /// Create a writer encoding this format.
    pub fn writer(self, output: OutputStream) -> Box<dyn RecordWriter> {
        match self {
            Format::Raw => Box::new(RawWriter::new(output)),
            Format::Text => Box::new(TextWriter::new(output)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Raw => write!(f, "raw"),
            Format::Text => write!(f, "text"),
        }
    }
}
