//! Serial input protocol and outbound events of the smart lock.
//!
//! This crate turns raw lines from the keypad/card reader board into
//! structured inputs, and defines the events the controller publishes toward
//! the external event bus.
//!
//! # Examples
//!
//! ```
//! use smartlock_protocol::{DecodedInput, InputDecoder, RawFrame};
//!
//! let mut decoder = InputDecoder::new();
//! decoder.decode(&RawFrame::from("01KB1\n")).unwrap();
//! decoder.decode(&RawFrame::from("01KB2\n")).unwrap();
//!
//! let submitted = decoder.decode(&RawFrame::from("01KB11\n")).unwrap();
//! assert_eq!(submitted, DecodedInput::Submit("12".to_string()));
//! ```

pub mod decoder;
pub mod error;
pub mod event;
pub mod frame;

pub use decoder::{DecodedInput, InputBuffer, InputDecoder};
pub use error::{DecodeError, Result};
pub use event::{DeviceEvent, EventCommand, StateDelta};
pub use frame::{Frame, InputType, KeypadKey, RawFrame};
