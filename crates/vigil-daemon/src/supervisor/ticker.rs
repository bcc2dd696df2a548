use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Source of periodic wake-ups for the supervisor loop.
///
/// Implementations must be cancel safe: the loop drops a pending `tick`
/// whenever another branch of its select completes first.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Wall-clock ticker. The first tick fires one full period after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Ticker driven explicitly through a [`ManualTickerHandle`].
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct ManualTickerHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTickerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTickerHandle { tx })
    }
}

impl ManualTickerHandle {
    /// Returns false once the ticker has been dropped.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        // With every handle gone the ticker never fires again.
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interval_ticker_skips_immediate_tick() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(200));
        assert_eq!(ticker.period(), Duration::from_millis(200));

        let early = tokio::time::timeout(Duration::from_millis(50), ticker.tick()).await;
        assert!(early.is_err());

        tokio::time::timeout(Duration::from_secs(5), ticker.tick())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_manual_ticker_fires_once_per_tick() {
        let (mut ticker, handle) = ManualTicker::new();
        assert!(handle.tick());
        assert!(handle.tick());

        tokio::time::timeout(Duration::from_millis(100), ticker.tick()).await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), ticker.tick()).await.unwrap();
        let third = tokio::time::timeout(Duration::from_millis(50), ticker.tick()).await;
        assert!(third.is_err());
    }

    #[tokio::test]
    async fn test_manual_ticker_goes_quiet_without_handles() {
        let (mut ticker, handle) = ManualTicker::new();
        drop(handle);
        let tick = tokio::time::timeout(Duration::from_millis(50), ticker.tick()).await;
        assert!(tick.is_err());
    }
}
