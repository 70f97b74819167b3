//! Progress aggregation and throughput reporting.
//!
//! Every progress stream gets its own forwarding task feeding one relay
//! channel. The relay closes when the last forwarder drops its sender, which
//! happens only after every input stream has closed; the accounting loop
//! then logs the final summary and returns.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::core::{Outcome, ProgressStream};

/// Default period between throughput lines.
pub const DEFAULT_REPORT_PERIOD: Duration = Duration::from_secs(1);

/// Final counters of a reporting run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub successes: u64,
    pub errors: u64,
}

/// Aggregator of progress streams.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    period: Option<Duration>,
}

impl Reporter {
    /// Create a reporter logging a throughput line every `period`.
    ///
    /// `None` or a zero period is quiet mode: only failures and the final
    /// summary are logged.
    pub fn new(period: Option<Duration>) -> Self {
        Self {
            period: period.filter(|p| !p.is_zero()),
        }
    }

    pub fn quiet() -> Self {
        Self::new(None)
    }

    /// Count outcomes until every stream has closed.
    pub async fn run(self, first: ProgressStream, rest: Vec<ProgressStream>) -> ReportSummary {
        let inputs = 1 + rest.len();
        let (relay_tx, mut relay) = mpsc::channel(inputs);

        let mut forwarders = JoinSet::new();
        for mut stream in std::iter::once(first).chain(rest) {
            let relay_tx = relay_tx.clone();
            forwarders.spawn(async move {
                while let Some(outcome) = stream.recv().await {
                    if relay_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(relay_tx);

        let mut ticker = self.period.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let mut summary = ReportSummary::default();
        let mut reported = 0;
        loop {
            tokio::select! {
                outcome = relay.recv() => match outcome {
                    Some(Outcome::Success) => summary.successes += 1,
                    Some(Outcome::Failure(e)) => {
                        warn!("error processing message: {}", e);
                        summary.errors += 1;
                    }
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    info!(
                        "messages processed: {} (total: {} | errors: {})",
                        summary.successes - reported,
                        summary.successes,
                        summary.errors
                    );
                    reported = summary.successes;
                }
            }
        }

        info!("total messages processed: {}", summary.successes);
        summary
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Some(DEFAULT_REPORT_PERIOD))
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
