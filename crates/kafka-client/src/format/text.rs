//! Line-delimited text records.
//!
//! Every line is the value of one message; keys are not represented.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{InputStream, OutputStream, RecordReader, RecordWriter};
use crate::core::Message;
use crate::error::Result;

pub struct TextReader<R = InputStream> {
    input: R,
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Send + Unpin> TextReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: Vec::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Send + Unpin> RecordReader for TextReader<R> {
    async fn read(&mut self) -> Result<Option<Message>> {
        self.line.clear();
        let read = self.input.read_until(b'\n', &mut self.line).await?;
        if read == 0 {
            return Ok(None);
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        Ok(Some(Message::from_value(Bytes::copy_from_slice(&self.line))))
    }
}

pub struct TextWriter<W = OutputStream> {
    output: W,
}

impl<W: AsyncWrite + Send + Unpin> TextWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> RecordWriter for TextWriter<W> {
    async fn write(&mut self, message: &Message) -> Result<()> {
        self.output.write_all(message.value()).await?;
        self.output.write_all(b"\n").await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.output.flush().await?;
        Ok(())
    }
}
