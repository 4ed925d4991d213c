//! Cancellable poll ticker
//!
//! The producer has no way to wake the relay, so the relay polls. The ticker
//! paces those polls and doubles as the cancellation point of the loop: a
//! cancelled token ends the current wait immediately.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Fixed-period ticker that can be cancelled
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    cancel: CancellationToken,
}

impl Ticker {
    /// First tick fires one `period` after creation
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, cancel }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the next tick. Returns false if cancelled first.
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.interval.tick() => true,
        }
    }
}
