//! Error types for hardware operations.
//!
//! Covers the serial link to the keypad/card board, the lock driver and the
//! sound backend.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// No serial port could be opened.
    #[error("No serial port available after {attempts} attempts: {message}")]
    PortUnavailable { attempts: u32, message: String },

    /// Serial port error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the operation cannot help.
    ///
    /// The frame reader stops on fatal errors instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. } | Self::InitializationFailed { .. } | Self::PortUnavailable { .. }
        )
    }
}
