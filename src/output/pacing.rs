//! Adaptive flush pacing
//!
//! Each flush feeds the time since the previous one, clamped to
//! `[min, max]`, into a slow moving average. A median estimate follows the
//! average at a sixteenth of the distance per flush and serves as the
//! minimum spacing before the next flush. A long idle gap snaps both
//! estimates back to the minimum so the first frame after a pause goes out
//! immediately.

use std::time::{Duration, Instant};

use crate::config::PacingConfig;

/// Flush interval estimator
#[derive(Debug, Clone)]
pub struct FlushPacer {
    min: Duration,
    max: Duration,
    idle_reset: Duration,
    last_flush: Option<Instant>,
    average: Duration,
    median: Duration,
}

impl FlushPacer {
    pub fn new(config: &PacingConfig) -> Self {
        let min = config.min_wait();
        Self {
            min,
            max: config.max_wait(),
            idle_reset: config.idle_reset(),
            last_flush: None,
            average: min,
            median: min,
        }
    }

    /// Minimum spacing before the next flush
    pub fn wait(&self) -> Duration {
        self.median
    }

    pub fn average(&self) -> Duration {
        self.average
    }

    pub fn last_flush(&self) -> Option<Instant> {
        self.last_flush
    }

    /// Check if enough time passed since the previous flush
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                elapsed >= self.median || elapsed > self.idle_reset
            },
        }
    }

    /// Fold a flush at `now` into the estimators
    pub fn record_flush(&mut self, now: Instant) {
        if let Some(last) = self.last_flush {
            let elapsed = now.saturating_duration_since(last);
            if elapsed > self.idle_reset {
                self.average = self.min;
                self.median = self.min;
            } else {
                let clamped = elapsed.clamp(self.min, self.max);
                self.average = (self.average * 7 + clamped) / 8;
                if self.average > self.median {
                    self.median += (self.average - self.median) / 16;
                } else {
                    self.median -= (self.median - self.average) / 16;
                }
            }
        }
        self.last_flush = Some(now);
    }
}
