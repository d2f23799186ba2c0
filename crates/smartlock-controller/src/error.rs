//! Error types for the controller.

use smartlock_hardware::HardwareError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors that stop the controller.
///
/// Everything caused by a single input frame is handled inside the loop;
/// only setup and shutdown failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Lock output or serial failure.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Unusable configuration snapshot.
    #[error(transparent)]
    Core(#[from] smartlock_core::Error),
}
