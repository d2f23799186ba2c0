//! Wall-clock source for timers.
//!
//! Timers store absolute epoch seconds, so the control loop reads time
//! through [`Clock`] and tests can drive it with a [`ManualClock`].

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn now_secs(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same time, so a test can keep one and hand the other to
/// the control loop.
///
/// # Examples
///
/// ```
/// use smartlock_core::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// let shared = clock.clone();
///
/// clock.advance(5);
/// assert_eq!(shared.now_secs(), 105);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `now` epoch seconds.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Set the current time.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
