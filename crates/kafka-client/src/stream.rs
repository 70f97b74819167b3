//! Files and standard streams for file-backed sources and sinks.

use std::io::{self, Read};
use std::path::Path;

use bytes::Bytes;
use futures::stream;
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::error::Result;
use crate::format::{InputStream, OutputStream};

/// Bytes handed over per read of a blocking input.
const CHUNK_SIZE: usize = 8 * 1024;

/// Chunks buffered between the reader thread and the pipeline.
const CHUNK_BUFFER: usize = 4;

/// Open `path` for buffered reading, or stdin when no path is given.
pub async fn open_input(path: Option<&Path>) -> Result<InputStream> {
    match path {
        Some(path) => {
            let file = File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => spawn_reader(io::stdin()),
    }
}

/// Read a blocking input on its own thread.
///
/// The thread is detached, so a read that never returns does not hold up
/// runtime shutdown. It exits at end of input, on a read error, or once the
/// returned stream is dropped and the next chunk cannot be delivered.
pub(crate) fn spawn_reader<R: Read + Send + 'static>(read: R) -> Result<InputStream> {
    let (chunks, received) = mpsc::channel(CHUNK_BUFFER);
    std::thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || forward_chunks(read, chunks))?;

    let chunks = stream::unfold(received, |mut received| async move {
        received.recv().await.map(|chunk| (chunk, received))
    });
    Ok(Box::new(StreamReader::new(Box::pin(chunks))))
}

fn forward_chunks<R: Read>(mut read: R, chunks: mpsc::Sender<io::Result<Bytes>>) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let chunk = match read.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = chunk.is_err();
        if chunks.blocking_send(chunk).is_err() || failed {
            return;
        }
    }
}

/// Create `path` for buffered writing, or stdout when no path is given.
///
/// Buffered data reaches the file when the owning writer is flushed.
pub async fn create_output(path: Option<&Path>) -> Result<OutputStream> {
    match path {
        Some(path) => {
            let file = File::create(path).await?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Human readable name of a stream for logs.
pub fn describe(path: Option<&Path>, standard: &str) -> String {
    match path {
        Some(path) => format!("'{}'", path.display()),
        None => standard.to_string(),
    }
}

/// Blocking input fed by hand, for tests that need stdin-like reads.
#[cfg(test)]
pub(crate) struct FedInput(pub std::sync::mpsc::Receiver<Vec<u8>>);

#[cfg(test)]
impl Read for FedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.recv() {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }
}
