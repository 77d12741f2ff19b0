//! Time source abstraction for operation timing.
//!
//! This module provides a `TimeSource` trait so that the database can time
//! its operations against the real monotonic clock in production and a
//! simulated clock in tests.

use std::time::{Duration, Instant};

/// Abstraction over a monotonic clock.
pub trait TimeSource {
    /// Time elapsed since some fixed, source-specific origin.
    fn now(&self) -> Duration;
}

/// Real time source backed by [`Instant`].
///
/// This is the default implementation used in production.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    /// Create a time source whose origin is the moment of creation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
