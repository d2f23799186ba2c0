//! Constants for the lock controller.
//!
//! This module centralizes the serial wire layout, keypad control codes,
//! control-loop timings and the bounds used throughout the workspace.
//!
//! # Serial Frame Layout
//!
//! Every frame coming from the keypad/card reader board is one line of ASCII:
//!
//! ```text
//! HHTTPAYLOAD\n
//! ```
//!
//! Where:
//! - `HH` - addressing/header prefix (ignored by the controller)
//! - `TT` - input type code, `KB` (keypad) or `CD` (card)
//! - `PAYLOAD` - keypad digit (two decimal characters) or card code,
//!   surrounded by optional whitespace
//!
//! # Usage
//!
//! ```
//! use smartlock_core::constants::*;
//!
//! let frame = "01KB11";
//! assert_eq!(&frame[TYPE_CODE_OFFSET..PAYLOAD_OFFSET], INPUT_TYPE_KEYPAD);
//! ```

// ============================================================================
// Serial Frame Layout
// ============================================================================

/// Byte offset of the two-character input type code.
///
/// Bytes before it are the board's addressing prefix.
pub const TYPE_CODE_OFFSET: usize = 2;

/// Byte offset where the payload starts.
pub const PAYLOAD_OFFSET: usize = 4;

/// Input type code for a keypad key press.
pub const INPUT_TYPE_KEYPAD: &str = "KB";

/// Input type code for a card scan.
pub const INPUT_TYPE_CARD: &str = "CD";

/// Line terminator of a serial frame.
pub const FRAME_TERMINATOR: u8 = b'\n';

// ============================================================================
// Keypad Control Codes
// ============================================================================

/// Keypad value of the clear key (`*`).
pub const KEYPAD_CLEAR: u8 = 10;

/// Keypad value of the submit key (`#`).
pub const KEYPAD_SUBMIT: u8 = 11;

/// Maximum number of characters kept in the keypad input buffer.
///
/// Digits pressed past this limit reset the buffer.
pub const MAX_INPUT_BUFFER_LEN: usize = 16;

// ============================================================================
// Access Codes
// ============================================================================

/// Separator used by the joined (string) representation of an access list.
///
/// # Examples
///
/// ```
/// use smartlock_core::constants::ACL_SEPARATOR;
///
/// let joined = "a1b2;c3d4";
/// assert_eq!(joined.split(ACL_SEPARATOR).count(), 2);
/// ```
pub const ACL_SEPARATOR: char = ';';

/// Maximum length of a normalized access code.
pub const MAX_CODE_LENGTH: usize = 64;

/// Maximum number of denied attempts retained in memory.
pub const MAX_ATTEMPT_LOG_SIZE: usize = 256;

// ============================================================================
// Timers
// ============================================================================

/// Name of the auto-close timer armed after a grant.
pub const AUTO_CLOSE_TIMER: &str = "main";

/// Upper bound accepted for the configured auto-close delay (one day).
pub const MAX_AUTO_CLOSE_SECS: i64 = 86_400;

// ============================================================================
// Control Loop Timing
// ============================================================================

/// Sleep of an idle control-loop iteration in milliseconds.
pub const DEFAULT_IDLE_SLEEP_MS: u64 = 100;

/// Settle delay after every access decision in milliseconds.
///
/// Debounces the keypad and the card reader, which repeat frames.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Pause of the serial reader after an empty or failed read in milliseconds.
pub const READER_RETRY_DELAY_MS: u64 = 100;

// ============================================================================
// Serial Port
// ============================================================================

/// Baud rate of the keypad/card reader board.
pub const DEFAULT_BAUD_RATE: u32 = 9_600;

/// Read timeout of a single serial line read in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Serial ports tried in order when acquiring the reader board.
pub const DEFAULT_SERIAL_PORTS: &[&str] = &["/dev/ttyS1", "/dev/ttyAMA1"];

/// Number of acquisition rounds over [`DEFAULT_SERIAL_PORTS`] before giving up.
pub const DEFAULT_ACQUIRE_ATTEMPTS: u32 = 5;

/// Pause between acquisition rounds in milliseconds.
pub const ACQUIRE_RETRY_DELAY_MS: u64 = 1_000;

// ============================================================================
// Events
// ============================================================================

/// Category of every event emitted toward the event bus.
pub const EVENT_CATEGORY_DEVICE: &str = "device";

/// Identifier used in event messages for transitions not caused by a code.
pub const SYSTEM_IDENT: &str = "system";
