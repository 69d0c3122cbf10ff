//! Delay accounting for throttled transfers
//!
//! A [`Pacer`] compares how long a batch of bytes took with how long it should
//! have taken at the configured speed. Shortfalls accumulate until they are
//! worth a timer, so many small reads still add up to the right total delay.

use std::time::Duration;

use tokio::time::Instant;

use crate::app::throttle::speed::Speed;
use crate::constants::throttle::MIN_DELAY_MS;

#[derive(Debug, Default)]
pub struct Pacer {
    window_start: Option<Instant>,
    pending_ms: f64,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `bytes` just transferred at `speed`
    ///
    /// Returns the delay to apply once the accumulated shortfall reaches the
    /// minimum delay. The caller must call [`Pacer::resume`] when that delay
    /// has elapsed so the sleep itself is not counted as transfer time.
    pub fn record(&mut self, bytes: usize, speed: Speed) -> Option<Duration> {
        let now = Instant::now();

        if speed.is_unlimited() {
            self.pending_ms = 0.0;
            self.window_start = Some(now);
            return None;
        }

        let elapsed_ms = self
            .window_start
            .map(|start| now.duration_since(start).as_nanos() as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        self.window_start = Some(now);

        let deficit = speed.nominal_millis(bytes) - elapsed_ms;
        if deficit > 0.0 {
            self.pending_ms += deficit;
        }

        if self.pending_ms >= MIN_DELAY_MS {
            Some(self.take_pending())
        } else {
            None
        }
    }

    /// Remaining shortfall, flushed at the end of a stream
    pub fn drain(&mut self) -> Option<Duration> {
        if self.pending_ms > 0.0 {
            Some(self.take_pending())
        } else {
            None
        }
    }

    /// Restart the accounting window after a delay has elapsed
    pub fn resume(&mut self) {
        self.window_start = Some(Instant::now());
    }

    /// Shortfall not yet turned into a delay
    pub fn pending(&self) -> Duration {
        millis_to_duration(self.pending_ms)
    }

    fn take_pending(&mut self) -> Duration {
        let delay = millis_to_duration(self.pending_ms);
        self.pending_ms = 0.0;
        delay
    }
}

fn millis_to_duration(ms: f64) -> Duration {
    Duration::from_nanos((ms * 1_000_000.0).round() as u64)
}
