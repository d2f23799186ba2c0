//! Keypad/card input decoder.
//!
//! The decoder keeps the scratch state of the panel between frames: the
//! digits typed so far and the card reentrancy guard. Each call to
//! [`InputDecoder::decode`] consumes one frame and reports what the control
//! loop has to do with it.
//!
//! # Reentrancy guard
//!
//! Card readers repeat a scan while the card stays on the antenna. Once a
//! card transaction has finished, [`InputDecoder::finish_transaction`]
//! records the instant it settled, and every card frame received before that
//! instant is swallowed as a duplicate.

use crate::error::{DecodeError, Result};
use crate::frame::{Frame, KeypadKey, RawFrame};
use smartlock_core::constants::MAX_INPUT_BUFFER_LEN;
use std::time::Instant;

/// What a decoded frame asks the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedInput {
    /// A keypad digit was appended to the buffer.
    Accumulate,
    /// The buffer was cleared by the clear key.
    ClearBuffer,
    /// The submit key was pressed, carrying the buffer contents.
    Submit(String),
    /// A card was scanned.
    CardScan(String),
    /// A duplicate card frame was swallowed by the reentrancy guard.
    Suppressed,
}

/// Digits accumulated during keypad entry.
///
/// # Examples
///
/// ```
/// use smartlock_protocol::InputBuffer;
///
/// let mut buffer = InputBuffer::with_capacity(4);
/// buffer.push("12").unwrap();
/// buffer.push("34").unwrap();
/// assert!(buffer.push("5").is_err());
/// assert!(buffer.is_empty()); // reset on overflow
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBuffer {
    digits: String,
    max_len: usize,
}

impl InputBuffer {
    /// Create a buffer holding at most [`MAX_INPUT_BUFFER_LEN`] chars.
    pub fn new() -> Self {
        Self::with_capacity(MAX_INPUT_BUFFER_LEN)
    }

    /// Create a buffer holding at most `max_len` chars.
    pub fn with_capacity(max_len: usize) -> Self {
        Self {
            digits: String::with_capacity(max_len),
            max_len,
        }
    }

    /// Append `digits`.
    ///
    /// # Errors
    /// Returns `DecodeError::BufferOverflow` and clears the buffer if the
    /// result would exceed the limit.
    pub fn push(&mut self, digits: &str) -> Result<()> {
        if self.digits.len() + digits.len() > self.max_len {
            self.digits.clear();
            return Err(DecodeError::BufferOverflow { max: self.max_len });
        }
        self.digits.push_str(digits);
        Ok(())
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.digits)
    }

    /// Empty the buffer.
    pub fn clear(&mut self) {
        self.digits.clear();
    }

    /// Current contents.
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    /// Number of chars buffered.
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful decoder for serial frames.
#[derive(Debug, Default)]
pub struct InputDecoder {
    buffer: InputBuffer,

    /// A card scan was handed out and its transaction has not finished yet.
    card_in_flight: bool,

    /// Card frames received before this instant are duplicates.
    card_guard_until: Option<Instant>,
}

impl InputDecoder {
    /// Create a decoder with the default buffer limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder whose keypad buffer holds at most `max_len` chars.
    pub fn with_buffer_limit(max_len: usize) -> Self {
        Self {
            buffer: InputBuffer::with_capacity(max_len),
            ..Self::default()
        }
    }

    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed frames. The keypad buffer is
    /// reset on every error so a bad frame never leaks into the next code.
    pub fn decode(&mut self, frame: &RawFrame) -> Result<DecodedInput> {
        let parsed = match frame.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                self.buffer.clear();
                return Err(e);
            }
        };

        match parsed {
            Frame::Keypad(KeypadKey::Clear) => {
                self.buffer.clear();
                Ok(DecodedInput::ClearBuffer)
            }
            Frame::Keypad(KeypadKey::Submit) => Ok(DecodedInput::Submit(self.buffer.take())),
            Frame::Keypad(KeypadKey::Digit(digits)) => {
                self.buffer.push(&digits)?;
                Ok(DecodedInput::Accumulate)
            }
            Frame::Card(code) => {
                if self.is_guarded(frame) {
                    return Ok(DecodedInput::Suppressed);
                }
                self.card_guard_until = None;
                self.card_in_flight = true;
                Ok(DecodedInput::CardScan(code))
            }
        }
    }

    /// End the current transaction.
    ///
    /// Clears the keypad buffer. If the transaction was a card scan, card
    /// frames received before `settled_at` will be swallowed.
    pub fn finish_transaction(&mut self, settled_at: Instant) {
        self.buffer.clear();
        if self.card_in_flight {
            self.card_guard_until = Some(settled_at);
            self.card_in_flight = false;
        }
    }

    /// Drop the digits typed so far.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Current keypad buffer.
    pub fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    /// Returns `true` while card duplicates are being swallowed.
    pub fn is_card_guard_set(&self) -> bool {
        self.card_in_flight || self.card_guard_until.is_some()
    }

    fn is_guarded(&self, frame: &RawFrame) -> bool {
        self.card_in_flight
            || self
                .card_guard_until
                .is_some_and(|until| frame.received_at() <= until)
    }
}
