//! Hardware layer of the smart lock.
//!
//! - [`serial`]: newline-framed sources and serial port acquisition
//! - [`reader`]: background task feeding frames to the control loop
//! - [`actuator`]: lock output with cached state
//! - [`sound`]: optional audio feedback
//! - [`mock`]: controllable devices for tests and development
//!
//! # Example
//!
//! ```
//! use smartlock_hardware::mock::{MockLockDriver, MockSound};
//! use smartlock_hardware::{Actuation, LockActuator};
//!
//! let (driver, outputs) = MockLockDriver::new();
//! let (mut sound, _) = MockSound::new();
//!
//! let mut lock = LockActuator::new(driver).unwrap();
//! assert_eq!(lock.open(&mut sound).unwrap(), Actuation::Performed);
//! assert_eq!(lock.open(&mut sound).unwrap(), Actuation::NoOp);
//! assert_eq!(outputs.writes(), vec![true, false]);
//! ```

pub mod actuator;
pub mod error;
pub mod mock;
pub mod reader;
pub mod serial;
pub mod sound;

pub use actuator::{Actuation, LockActuator, LockDriver, LoggingDriver, SysfsGpioDriver};
pub use error::{HardwareError, Result};
pub use reader::{ReaderExit, ReaderHandle, ReaderReport, SerialFrameReader};
pub use serial::{FrameSource, LineFrameSource, SerialConfig, SerialFrameSource, open_serial};
pub use sound::{PlayerSound, SilentSound, SoundCoordinator, SoundCue, select_sound};
