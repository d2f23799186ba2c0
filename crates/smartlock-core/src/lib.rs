//! Core domain types for the smart lock controller.
//!
//! Holds the pieces shared by every other crate in the workspace: the lock
//! state owned by the control loop, the access-control list, the configuration
//! snapshot supplied by the external config collaborator, and the named
//! auto-close timers.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod timer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LockConfig;
pub use error::{Error, Result};
pub use timer::TimerRegistry;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
