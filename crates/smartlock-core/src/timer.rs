//! Named countdown timers.
//!
//! Each timer is stored as an absolute expiry in epoch seconds. A timer fires
//! at most once: [`TimerRegistry::check`] removes it the moment it reports it
//! as due.
//!
//! # Examples
//!
//! ```
//! use smartlock_core::TimerRegistry;
//!
//! let mut timers = TimerRegistry::new();
//! timers.arm("main", 100, 10);
//!
//! assert!(!timers.check("main", 109));
//! assert!(timers.check("main", 110));
//! assert!(!timers.check("main", 111)); // already fired
//! ```

use std::collections::HashMap;

/// Registry of named timers keyed by string.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    timers: HashMap<String, u64>,
}

impl TimerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `name` to expire `delay` seconds after `now`.
    ///
    /// A `delay <= 0` arms nothing: the lock stays open until it is closed
    /// explicitly. Re-arming an existing timer replaces its expiry.
    ///
    /// Returns the expiry when a timer was armed.
    pub fn arm(&mut self, name: &str, now: u64, delay: i64) -> Option<u64> {
        let delay = u64::try_from(delay).ok().filter(|d| *d > 0)?;
        let expiry = now.saturating_add(delay);
        self.timers.insert(name.to_string(), expiry);
        Some(expiry)
    }

    /// Check whether `name` is due at `now`.
    ///
    /// Returns `true` and removes the timer if its expiry is `<= now`.
    /// Returns `false` for pending and unknown timers.
    pub fn check(&mut self, name: &str, now: u64) -> bool {
        match self.timers.get(name) {
            Some(&expiry) if expiry <= now => {
                self.timers.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Drop `name` without checking its expiry.
    ///
    /// Returns `true` if a timer was removed.
    pub fn clear(&mut self, name: &str) -> bool {
        self.timers.remove(name).is_some()
    }

    /// Expiry of `name`, if armed.
    #[must_use]
    pub fn expiry(&self, name: &str) -> Option<u64> {
        self.timers.get(name).copied()
    }

    /// Returns `true` if `name` is armed.
    #[must_use]
    pub fn is_armed(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if no timer is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
