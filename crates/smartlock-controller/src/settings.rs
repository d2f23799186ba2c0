//! Control loop tuning.

use serde::{Deserialize, Serialize};
use smartlock_core::constants::{
    AUTO_CLOSE_TIMER, DEFAULT_IDLE_SLEEP_MS, DEFAULT_SETTLE_DELAY_MS, MAX_INPUT_BUFFER_LEN,
};
use std::time::Duration;

/// Timing and sizing of the control loop.
///
/// Deserialized from the `[controller]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Sleep when an iteration found nothing to do, in milliseconds.
    pub idle_sleep_ms: u64,

    /// Pause after every access decision, in milliseconds.
    pub settle_delay_ms: u64,

    /// Longest keypad entry kept before the buffer is reset.
    pub max_buffer_len: usize,

    /// Name of the auto-close timer.
    pub auto_close_timer: String,
}

impl ControllerConfig {
    /// Idle sleep as a [`Duration`].
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: DEFAULT_IDLE_SLEEP_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_buffer_len: MAX_INPUT_BUFFER_LEN,
            auto_close_timer: AUTO_CLOSE_TIMER.to_string(),
        }
    }
}
