//! Time source abstraction.
//!
//! Expiry checks and issuance read the current time through [`Clock`] so
//! tests can pin or advance it.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use chrono::Utc;

/// Supplies the current time as seconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        unix_seconds(Utc::now().timestamp())
    }
}

/// Converts a signed Unix timestamp to the clock's unsigned seconds.
///
/// A pre-epoch reading maps to `u64::MAX` so every token reads as expired
/// until the host clock is fixed.
fn unix_seconds(timestamp: i64) -> u64 {
    u64::try_from(timestamp).unwrap_or_else(|_| {
        tracing::error!(timestamp, "System clock is before the Unix epoch");
        u64::MAX
    })
}

/// A manually controlled clock.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    /// Creates a clock reading `now`.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    /// Sets the current time.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
