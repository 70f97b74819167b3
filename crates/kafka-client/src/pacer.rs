//! Rate limiting for producers.
//!
//! A [`Pacer`] hands out one permission per period. With a zero period the
//! gate is permanently open and [`Pacer::ready`] never waits, so callers
//! treat both cases the same way:
//!
//! ```rust,no_run
//! # use std::time::Duration;
//! # use kafka_client::Pacer;
//! # async fn produce_all(period: Duration) {
//! let mut pacer = Pacer::new(period);
//! loop {
//!     pacer.ready().await;
//!     // produce one message
//! #   break;
//! }
//! pacer.stop();
//! # }
//! ```

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

enum Gate {
    Ticking(Interval),
    Open,
    Stopped,
}

/// Time-gated permission signal.
pub struct Pacer {
    gate: Gate,
}

impl Pacer {
    /// Create a pacer that allows one pass every `period`.
    ///
    /// The first pass is granted one period after creation.
    pub fn new(period: Duration) -> Self {
        if period.is_zero() {
            return Self { gate: Gate::Open };
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            gate: Gate::Ticking(ticker),
        }
    }

    /// Wait for the next permission.
    ///
    /// An open gate returns immediately. A stopped ticking pacer never
    /// grants another pass.
    pub async fn ready(&mut self) {
        match &mut self.gate {
            Gate::Ticking(ticker) => {
                ticker.tick().await;
            }
            Gate::Open => {}
            Gate::Stopped => std::future::pending().await,
        }
    }

    /// Release the underlying timer. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Gate::Ticking(_) = self.gate {
            self.gate = Gate::Stopped;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gate = match &self.gate {
            Gate::Ticking(ticker) => format!("every {:?}", ticker.period()),
            Gate::Open => "open".to_string(),
            Gate::Stopped => "stopped".to_string(),
        };
        f.debug_struct("Pacer").field("gate", &gate).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_zero_period_never_waits() {
        let mut pacer = Pacer::new(Duration::ZERO);
        assert!(matches!(pacer.gate, Gate::Open));
        for _ in 0..1000 {
            futures::FutureExt::now_or_never(pacer.ready())
                .expect("open gate should be ready immediately");
        }
        pacer.stop();
        pacer.stop();
        assert!(futures::FutureExt::now_or_never(pacer.ready()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_spaces_receives() {
        let period = Duration::from_millis(250);
        let mut pacer = Pacer::new(period);
        assert!(matches!(pacer.gate, Gate::Ticking(_)));

        let mut last = Instant::now();
        for _ in 0..5 {
            pacer.ready().await;
            let now = Instant::now();
            assert!(now - last >= period);
            last = now;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_not_ready_before_first_tick() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        assert!(futures::FutureExt::now_or_never(pacer.ready()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_pacer_never_fires() {
        let mut pacer = Pacer::new(Duration::from_millis(10));
        pacer.stop();
        pacer.stop();
        let waited = timeout(Duration::from_secs(5), pacer.ready()).await;
        assert!(waited.is_err());
    }
}
