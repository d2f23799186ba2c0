//! Control core of the smart lock.
//!
//! Ties the serial frame queue, access evaluation, auto-close timers, the lock
//! actuator and sound feedback together in a single cooperative loop.
//!
//! - [`access`]: who may open the lock and what a presented code does
//! - [`control_loop`]: the loop owning all lock state
//! - [`settings`]: loop timing

pub mod access;
pub mod control_loop;
pub mod error;
pub mod settings;

pub use access::{AccessDecision, AccessEvaluator, DenialReason, UnlockAttempt, UnlockAttemptLog};
pub use control_loop::{ControlLoop, ControlLoopBuilder, Tick};
pub use error::{ControllerError, Result};
pub use settings::ControllerConfig;
