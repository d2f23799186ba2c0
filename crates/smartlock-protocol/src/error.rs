//! Errors raised while decoding serial frames.
//!
//! Every variant is recoverable: the frame is discarded, the keypad buffer is
//! reset and the panel gets a denial cue.

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors that can occur while decoding a serial frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Frame bytes are not valid text.
    #[error("Invalid frame encoding: {message}")]
    InvalidEncoding { message: String },

    /// Frame ends before the input type code.
    #[error("Frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    /// Input type code is neither keypad nor card.
    #[error("Unknown input type: {code:?}")]
    UnknownInputType { code: String },

    /// Keypad payload is not a key value.
    #[error("Invalid keypad digit: {payload:?}")]
    InvalidKeypadDigit { payload: String },

    /// Card frame without a code.
    #[error("Empty card code")]
    EmptyCardCode,

    /// Keypad buffer would grow past its limit.
    #[error("Input buffer overflow: more than {max} chars")]
    BufferOverflow { max: usize },
}

impl DecodeError {
    /// Create a new invalid encoding error.
    pub fn invalid_encoding(message: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            message: message.into(),
        }
    }

    /// Create a new unknown input type error.
    pub fn unknown_input_type(code: impl Into<String>) -> Self {
        Self::UnknownInputType { code: code.into() }
    }

    /// Create a new invalid keypad digit error.
    pub fn invalid_keypad_digit(payload: impl Into<String>) -> Self {
        Self::InvalidKeypadDigit {
            payload: payload.into(),
        }
    }
}
