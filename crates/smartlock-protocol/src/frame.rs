//! Serial frame layout.
//!
//! A frame is one line sent by the keypad/card reader board:
//!
//! ```text
//! 01KB05      keypad key "05"
//! 01KB11      keypad submit (#)
//! 01CD 04AB   card scan, code "04AB"
//! ^^          addressing prefix, ignored
//!   ^^        input type code
//!     ^^^^    payload, trimmed
//! ```

use crate::error::{DecodeError, Result};
use bytes::Bytes;
use smartlock_core::constants::{
    INPUT_TYPE_CARD, INPUT_TYPE_KEYPAD, KEYPAD_CLEAR, KEYPAD_SUBMIT, PAYLOAD_OFFSET,
    TYPE_CODE_OFFSET,
};
use std::time::Instant;

/// One raw line read from the serial port.
///
/// Frames are stamped with the instant they were received so that duplicate
/// card reads can be recognized after a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    data: Bytes,
    received_at: Instant,
}

impl RawFrame {
    /// Create a frame received now.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_received_at(data, Instant::now())
    }

    /// Create a frame with an explicit receive instant.
    pub fn with_received_at(data: impl Into<Bytes>, received_at: Instant) -> Self {
        Self {
            data: data.into(),
            received_at,
        }
    }

    /// Raw bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Instant the frame was received.
    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the frame has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interpret the frame according to the wire layout.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the bytes are not valid UTF-8, the frame
    /// is shorter than its header, the type code is unknown, or the payload
    /// does not fit the input type.
    pub fn parse(&self) -> Result<Frame> {
        let text = std::str::from_utf8(&self.data)
            .map_err(|e| DecodeError::invalid_encoding(e.to_string()))?;

        let code = text
            .get(TYPE_CODE_OFFSET..PAYLOAD_OFFSET)
            .ok_or(DecodeError::FrameTooShort { len: text.len() })?;
        let payload = text.get(PAYLOAD_OFFSET..).unwrap_or_default().trim();

        match InputType::from_code(code)? {
            InputType::Keypad => Ok(Frame::Keypad(KeypadKey::parse(payload)?)),
            InputType::Card => {
                if payload.is_empty() {
                    return Err(DecodeError::EmptyCardCode);
                }
                Ok(Frame::Card(payload.to_string()))
            }
        }
    }
}

impl From<&'static str> for RawFrame {
    fn from(data: &'static str) -> Self {
        Self::new(Bytes::from_static(data.as_bytes()))
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// Input type carried in bytes 2-3 of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    /// Keypad key press (`KB`).
    Keypad,
    /// Card scan (`CD`).
    Card,
}

impl InputType {
    /// Parse a two-character type code.
    ///
    /// # Errors
    /// Returns `DecodeError::UnknownInputType` for anything but `KB` and `CD`.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            INPUT_TYPE_KEYPAD => Ok(InputType::Keypad),
            INPUT_TYPE_CARD => Ok(InputType::Card),
            other => Err(DecodeError::unknown_input_type(other)),
        }
    }

    /// Two-character wire code.
    pub fn as_code(self) -> &'static str {
        match self {
            InputType::Keypad => INPUT_TYPE_KEYPAD,
            InputType::Card => INPUT_TYPE_CARD,
        }
    }
}

/// Key reported by a keypad frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypadKey {
    /// Clear key (`10`).
    Clear,
    /// Submit key (`11`).
    Submit,
    /// Any other key, kept exactly as sent.
    Digit(String),
}

impl KeypadKey {
    /// Parse a keypad payload: one or two decimal characters.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidKeypadDigit` for anything else.
    pub fn parse(payload: &str) -> Result<Self> {
        let valid = (1..=2).contains(&payload.len()) && payload.bytes().all(|b| b.is_ascii_digit());
        if !valid {
            return Err(DecodeError::invalid_keypad_digit(payload));
        }

        let value: u8 = payload
            .parse()
            .map_err(|_| DecodeError::invalid_keypad_digit(payload))?;

        Ok(match value {
            KEYPAD_CLEAR => KeypadKey::Clear,
            KEYPAD_SUBMIT => KeypadKey::Submit,
            _ => KeypadKey::Digit(payload.to_string()),
        })
    }
}

/// Structured content of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keypad key press.
    Keypad(KeypadKey),
    /// Card scan with its trimmed code.
    Card(String),
}

impl Frame {
    /// Input type of this frame.
    pub fn input_type(&self) -> InputType {
        match self {
            Frame::Keypad(_) => InputType::Keypad,
            Frame::Card(_) => InputType::Card,
        }
    }
}
