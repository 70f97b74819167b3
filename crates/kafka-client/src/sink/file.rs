//! File-backed sink.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    progress_stream, MessageReceiver, Outcome, ProgressSender, ProgressStream, Sink,
};
use crate::error::{ClientError, Result};
use crate::format::RecordWriter;

/// Sink that writes messages in arrival order with a [`RecordWriter`].
///
/// The first write error stops the sink; it is reported on the progress
/// stream and returned from [`Sink::run`].
pub struct FileSink {
    messages: MessageReceiver,
    writer: Box<dyn RecordWriter>,
    progress_tx: ProgressSender,
    progress_rx: Option<ProgressStream>,
}

impl FileSink {
    pub fn new(messages: MessageReceiver, writer: Box<dyn RecordWriter>) -> Self {
        let (progress_tx, progress_rx) = progress_stream(1);
        Self {
            messages,
            writer,
            progress_tx,
            progress_rx: Some(progress_rx),
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    fn progress(&mut self) -> Option<ProgressStream> {
        self.progress_rx.take()
    }

    async fn run(self: Box<Self>, _cancel: CancellationToken) -> Result<()> {
        let FileSink {
            mut messages,
            mut writer,
            progress_tx: progress,
            ..
        } = *self;

        let mut written = 0u64;
        while let Some(message) = messages.recv().await {
            if let Err(e) = writer.write(&message).await {
                let err = Arc::new(e);
                let _ = progress.send(Outcome::Failure(Arc::clone(&err))).await;

                // Keep what was written before the failure
                if let Err(flush_err) = writer.flush().await {
                    debug!("flush after write error failed: {}", flush_err);
                }
                return Err(ClientError::Reported(err));
            }

            written += 1;
            let _ = progress.send(Outcome::Success).await;
        }

        writer.flush().await?;
        debug!("file sink finished after {} messages", written);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file sink"
    }
}
