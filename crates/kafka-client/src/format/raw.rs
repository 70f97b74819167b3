//! Length-prefixed binary records.
//!
//! Each record is the key followed by the value, both prefixed with their
//! length as a little-endian `u32`. An absent key is written with length 0.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{InputStream, OutputStream, RecordReader, RecordWriter};
use crate::core::Message;
use crate::error::{ClientError, Result};

pub struct RawReader<R = InputStream> {
    input: R,
}

impl<R: AsyncBufRead + Send + Unpin> RawReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    async fn read_field(&mut self, field: &str) -> Result<Bytes> {
        let length = self.input.read_u32_le().await.map_err(|e| truncated(field, e))?;
        // Grows with the bytes actually present, not the declared length
        let mut data = Vec::new();
        (&mut self.input)
            .take(u64::from(length))
            .read_to_end(&mut data)
            .await?;
        if data.len() != length as usize {
            return Err(truncated(field, std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(Bytes::from(data))
    }
}

fn truncated(field: &str, err: std::io::Error) -> ClientError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ClientError::Decode(format!("raw record truncated while reading {}", field))
    } else {
        ClientError::Io(err)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Send + Unpin> RecordReader for RawReader<R> {
    async fn read(&mut self) -> Result<Option<Message>> {
        // Clean end of stream only at a record boundary
        if self.input.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let key = self.read_field("key").await?;
        let value = self.read_field("value").await?;
        Ok(Some(Message::new(Some(key), value)))
    }
}

pub struct RawWriter<W = OutputStream> {
    output: W,
}

impl<W: AsyncWrite + Send + Unpin> RawWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    async fn write_field(&mut self, data: &[u8]) -> Result<()> {
        let length = u32::try_from(data.len()).map_err(|_| {
            ClientError::Decode(format!("field of {} bytes exceeds raw format limit", data.len()))
        })?;
        self.output.write_u32_le(length).await?;
        self.output.write_all(data).await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> RecordWriter for RawWriter<W> {
    async fn write(&mut self, message: &Message) -> Result<()> {
        self.write_field(message.key().unwrap_or_default()).await?;
        self.write_field(message.value()).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(records: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in records {
            out.extend_from_slice(&(key.len() as u32).to_le_bytes());
            out.extend_from_slice(key);
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(value);
        }
        out
    }

    #[tokio::test]
    async fn test_read_records() {
        let data = encoded(&[(&b"k1"[..], &b"v1"[..]), (&b""[..], &b"no key"[..])]);
        let mut reader = RawReader::new(std::io::Cursor::new(data));

        assert_eq!(
            reader.read().await.unwrap(),
            Some(Message::keyed("k1", "v1"))
        );
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(second.key(), None);
        assert_eq!(second.value(), b"no key");
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_input_is_clean_eof() {
        let mut reader = RawReader::new(&b""[..]);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_value_is_error() {
        let mut data = encoded(&[(&b"key"[..], &b"value"[..])]);
        data.truncate(data.len() - 2);
        let mut reader = RawReader::new(std::io::Cursor::new(data));

        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(ref m) if m.contains("value")));
    }

    #[tokio::test]
    async fn test_truncated_length_prefix_is_error() {
        let mut reader = RawReader::new(&[1u8, 0][..]);
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(ref m) if m.contains("key")));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_error() {
        let mut data = 0xFFFF_FFF0u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"short");
        let mut reader = RawReader::new(std::io::Cursor::new(data));

        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(ref m) if m.contains("key")));
    }

    #[tokio::test]
    async fn test_written_bytes_match_layout() {
        let mut writer = RawWriter::new(Vec::new());
        writer.write(&Message::keyed("k", "value")).await.unwrap();
        writer.write(&Message::from_value("v")).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.output, encoded(&[(&b"k"[..], &b"value"[..]), (&b""[..], &b"v"[..])]));
    }
}
