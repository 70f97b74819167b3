//! Pipeline orchestrator - wires a source, a sink and the reporter.
//!
//! The three components run as tasks of one [`JoinSet`] under a shared run
//! scope derived from the caller's shutdown token. The first component to
//! fail cancels the scope so the others wind down, and the terminal error
//! is classified once every task has finished.

use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{Sink, Source};
use crate::error::{ClientError, Result};
use crate::report::{ReportSummary, Reporter};

/// Source, sink and reporter of one run.
pub struct Pipeline {
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    reporter: Reporter,
    duration: Option<Duration>,
}

/// Result of a pipeline run that stopped without error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineResult {
    /// Messages reported as processed.
    pub successes: u64,

    /// Failures reported by the source and the sink.
    pub errors: u64,

    /// Wall clock duration of the run.
    pub elapsed: Duration,

    /// Whether the run ended because its duration expired.
    pub expired: bool,
}

enum Finished {
    Component,
    Report(ReportSummary),
}

impl Pipeline {
    /// Create a pipeline. The sink must already own the source's message
    /// queue.
    pub fn new(source: Box<dyn Source>, sink: Box<dyn Sink>, reporter: Reporter) -> Self {
        Self {
            source,
            sink,
            reporter,
            duration: None,
        }
    }

    /// Stop the run cleanly after `duration`. `None` or zero runs until the
    /// source is exhausted or the run is interrupted.
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration.filter(|d| !d.is_zero());
        self
    }

    /// Run until every component has finished.
    ///
    /// Cancelling `shutdown` interrupts the run and yields
    /// [`ClientError::Interrupted`]. Reaching the configured duration is a
    /// clean stop. Otherwise the first component error is returned as is.
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineResult> {
        let Pipeline {
            mut source,
            mut sink,
            reporter,
            duration,
        } = self;

        let source_progress = source.progress().ok_or_else(|| {
            ClientError::Config(format!("{} progress stream already taken", source.name()))
        })?;
        let sink_progress = sink.progress().ok_or_else(|| {
            ClientError::Config(format!("{} progress stream already taken", sink.name()))
        })?;

        let started = Instant::now();
        let scope = shutdown.child_token();
        let deadline = CancellationToken::new();
        let watcher = duration.map(|duration| {
            tokio::spawn(watch_deadline(duration, scope.clone(), deadline.clone()))
        });

        info!("Starting pipeline: {} -> {}", source.name(), sink.name());

        let mut tasks = JoinSet::new();
        {
            let scope = scope.clone();
            tasks.spawn(async move {
                let name = source.name();
                source.run(scope).await.map(|_| Finished::Component).map_err(|e| {
                    debug!("{} failed: {}", name, e);
                    e
                })
            });
        }
        {
            let scope = scope.clone();
            tasks.spawn(async move {
                let name = sink.name();
                sink.run(scope).await.map(|_| Finished::Component).map_err(|e| {
                    debug!("{} failed: {}", name, e);
                    e
                })
            });
        }
        tasks.spawn(async move {
            let summary = reporter.run(source_progress, vec![sink_progress]).await;
            Ok(Finished::Report(summary))
        });

        let mut first_error = None;
        let mut summary = ReportSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Finished::Report(report))) => summary = report,
                Ok(Ok(Finished::Component)) => {}
                Ok(Err(e)) => {
                    scope.cancel();
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    scope.cancel();
                    first_error.get_or_insert(ClientError::task("pipeline", e.to_string()));
                }
            }
        }

        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let elapsed = started.elapsed();
        if let Some(e) = first_error {
            return Err(e);
        }
        if shutdown.is_cancelled() {
            info!("Pipeline interrupted after {:.1}s", elapsed.as_secs_f64());
            return Err(ClientError::Interrupted);
        }

        let expired = deadline.is_cancelled();
        info!(
            "Pipeline finished in {:.1}s{}",
            elapsed.as_secs_f64(),
            if expired { " (duration reached)" } else { "" }
        );
        Ok(PipelineResult {
            successes: summary.successes,
            errors: summary.errors,
            elapsed,
            expired,
        })
    }
}

/// Cancel `scope` once `duration` has passed, recording it in `deadline`.
async fn watch_deadline(duration: Duration, scope: CancellationToken, deadline: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            deadline.cancel();
            scope.cancel();
        }
        _ = scope.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;
    use crate::format::{Format, RecordReader, RecordWriter};
    use crate::sink::FileSink;
    use crate::source::FileSource;
    use crate::stream::{spawn_reader, FedInput};
    use crate::testing::capture;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::timeout;

    struct VecReader(VecDeque<Message>);

    #[async_trait]
    impl RecordReader for VecReader {
        async fn read(&mut self) -> Result<Option<Message>> {
            Ok(self.0.pop_front())
        }
    }

    /// Reader that never yields a record, like an idle stdin.
    struct IdleReader;

    #[async_trait]
    impl RecordReader for IdleReader {
        async fn read(&mut self) -> Result<Option<Message>> {
            std::future::pending().await
        }
    }

    #[derive(Clone, Default)]
    struct MemoryWriter {
        written: Arc<Mutex<Vec<Message>>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl RecordWriter for MemoryWriter {
        async fn write(&mut self, message: &Message) -> Result<()> {
            let mut written = self.written.lock().unwrap();
            if self.fail_on == Some(written.len() + 1) {
                return Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "write failed",
                )));
            }
            written.push(message.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn pipeline(reader: Box<dyn RecordReader>, writer: MemoryWriter) -> Pipeline {
        let mut source = Box::new(FileSource::new(reader));
        let messages = source.messages().unwrap();
        let sink = Box::new(FileSink::new(messages, Box::new(writer)));
        Pipeline::new(source, sink, Reporter::quiet())
    }

    fn two_messages() -> Box<dyn RecordReader> {
        Box::new(VecReader(VecDeque::from(vec![
            Message::keyed("k1", "v1"),
            Message::keyed("k2", "v2"),
        ])))
    }

    #[tokio::test]
    async fn test_transfers_all_messages() {
        let writer = MemoryWriter::default();
        let result = pipeline(two_messages(), writer.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.successes, 2);
        assert_eq!(result.errors, 0);
        assert!(!result.expired);
        assert_eq!(
            *writer.written.lock().unwrap(),
            vec![Message::keyed("k1", "v1"), Message::keyed("k2", "v2")]
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_terminal_error() {
        let writer = MemoryWriter {
            fail_on: Some(2),
            ..Default::default()
        };
        let err = pipeline(two_messages(), writer.clone())
            .run(CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("write failed"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(writer.written.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_counted_once() {
        let (logs, _guard) = capture();
        let writer = MemoryWriter {
            fail_on: Some(2),
            ..Default::default()
        };
        pipeline(two_messages(), writer)
            .run(CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(logs.count("error processing message"), 1);
        assert_eq!(logs.count("error processing message: IO error: write failed"), 1);
        assert_eq!(logs.count("total messages processed: 1"), 1);
    }

    #[tokio::test]
    async fn test_interrupt() {
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(
            pipeline(Box::new(IdleReader), MemoryWriter::default()).run(shutdown.clone()),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let result = timeout(Duration::from_secs(1), run)
            .await
            .expect("interrupted pipeline should stop")
            .unwrap();
        assert!(matches!(result, Err(ClientError::Interrupted)));
    }

    #[test]
    fn test_interrupt_with_blocked_stdin_releases_runtime() {
        let (feed, pending) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let writer = MemoryWriter::default();
        let result = runtime.block_on(async {
            let input = spawn_reader(FedInput(pending)).unwrap();
            let shutdown = CancellationToken::new();
            let run = tokio::spawn(
                pipeline(Format::Text.reader(input), writer.clone()).run(shutdown.clone()),
            );

            feed.send(b"one\n".to_vec()).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
            timeout(Duration::from_secs(1), run).await
        });
        let result = result.expect("interrupted pipeline should stop").unwrap();
        assert!(matches!(result, Err(ClientError::Interrupted)));
        assert_eq!(*writer.written.lock().unwrap(), vec![Message::from_value("one")]);

        let started = std::time::Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(feed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_is_clean_stop() {
        let result = pipeline(Box::new(IdleReader), MemoryWriter::default())
            .with_duration(Some(Duration::from_secs(30)))
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert!(result.expired);
        assert_eq!(result.successes, 0);
    }

    #[tokio::test]
    async fn test_progress_stream_taken() {
        let mut source = Box::new(FileSource::new(two_messages()));
        let messages = source.messages().unwrap();
        let _stolen = source.progress();
        let sink = Box::new(FileSink::new(messages, Box::new(MemoryWriter::default())));

        let err = Pipeline::new(source, sink, Reporter::quiet())
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
