//! Mock lock driver.

use crate::actuator::LockDriver;
use crate::error::{HardwareError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct DriverState {
    writes: Vec<bool>,
    fail_next: bool,
}

/// Lock driver recording every write.
#[derive(Debug)]
pub struct MockLockDriver {
    state: Arc<Mutex<DriverState>>,
}

impl MockLockDriver {
    /// Create a driver and its handle.
    pub fn new() -> (Self, MockLockDriverHandle) {
        let state = Arc::new(Mutex::new(DriverState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockLockDriverHandle { state },
        )
    }
}

fn lock(state: &Mutex<DriverState>) -> MutexGuard<'_, DriverState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LockDriver for MockLockDriver {
    fn drive(&mut self, closed: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.fail_next) {
            return Err(HardwareError::communication("mock output failure"));
        }
        state.writes.push(closed);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Test-side handle of a [`MockLockDriver`].
#[derive(Debug, Clone)]
pub struct MockLockDriverHandle {
    state: Arc<Mutex<DriverState>>,
}

impl MockLockDriverHandle {
    /// Levels written so far, `true` meaning closed.
    pub fn writes(&self) -> Vec<bool> {
        lock(&self.state).writes.clone()
    }

    /// Last level written.
    pub fn last_write(&self) -> Option<bool> {
        lock(&self.state).writes.last().copied()
    }

    /// Make the next write fail.
    pub fn fail_next(&self) {
        lock(&self.state).fail_next = true;
    }
}
