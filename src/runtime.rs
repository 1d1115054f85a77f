use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;

    /// Tokio interval for this ticker. The first tick fires immediately; late
    /// ticks are pushed back rather than bursted.
    fn start(&self) -> Interval {
        let mut iv = interval(self.interval().max(Duration::from_millis(1)));
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        iv
    }
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}
