use std::time::Duration;

use token_trek_core::Event;

/// Default cadence between automatic saves.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Pure system that accumulates session time and reports when a save is due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Autosave {
    interval: Duration,
    accumulator: Duration,
}

impl Default for Autosave {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_INTERVAL)
    }
}

impl Autosave {
    /// Creates an autosave timer firing every `interval`. A zero interval
    /// disables it.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulator: Duration::ZERO,
        }
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Consumes world events and reports whether a save should run now.
    ///
    /// Several elapsed intervals collapse into a single save.
    pub fn handle(&mut self, events: &[Event]) -> bool {
        if self.interval.is_zero() {
            return false;
        }

        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                self.accumulator = self.accumulator.saturating_add(*dt);
            }
        }

        if self.accumulator < self.interval {
            return false;
        }
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
        }
        true
    }

    /// Restarts the interval, typically after a manual save.
    pub fn restart(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
