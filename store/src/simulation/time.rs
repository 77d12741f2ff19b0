//! Simulated time source for deterministic testing.
//!
//! This module provides a controlled clock that only moves when told to,
//! so timing reported to observers is reproducible.

use std::cell::Cell;
use std::time::Duration;

use crate::storage::time::TimeSource;

/// A simulated time source for deterministic testing.
///
/// Unlike [`SystemTimeSource`](crate::storage::time::SystemTimeSource), this
/// implementation does not read the real clock. Each call to `now` advances
/// time by a fixed `step`, so every timed operation appears to take exactly
/// `step`.
///
/// # Thread Safety
///
/// This implementation uses [`Cell`] for interior mutability, making it
/// single-threaded only. The database is single-threaded anyway.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use store::simulation::SimulatedTimeSource;
/// use store::storage::time::TimeSource;
///
/// let time = SimulatedTimeSource::new(Duration::from_micros(5));
/// assert_eq!(time.now(), Duration::ZERO);
/// assert_eq!(time.now(), Duration::from_micros(5));
///
/// time.advance(Duration::from_millis(1));
/// assert_eq!(time.current(), Duration::from_micros(1_010));
/// ```
#[derive(Debug)]
pub struct SimulatedTimeSource {
    current: Cell<Duration>,
    step: Duration,
}

impl SimulatedTimeSource {
    /// Create a clock at zero that advances by `step` per reading.
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self {
            current: Cell::new(Duration::ZERO),
            step,
        }
    }

    /// Create a clock that never advances on its own.
    #[must_use]
    pub const fn frozen() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Advance time by the given amount.
    ///
    /// Time saturates instead of overflowing.
    pub fn advance(&self, by: Duration) {
        self.current.set(self.current.get().saturating_add(by));
    }

    /// Get the current simulated time without advancing it.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current.get()
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> Duration {
        let now = self.current.get();
        self.advance(self.step);
        now
    }
}

impl Default for SimulatedTimeSource {
    fn default() -> Self {
        Self::frozen()
    }
}
