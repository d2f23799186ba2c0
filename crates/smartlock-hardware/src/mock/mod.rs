//! Mock devices for testing and development.
//!
//! Every mock comes with a handle that drives or inspects it from the test
//! side while the device itself is owned by the code under test.

pub mod driver;
pub mod sound;
pub mod source;

pub use driver::{MockLockDriver, MockLockDriverHandle};
pub use sound::{MockSound, MockSoundHandle};
pub use source::{MockFrameSource, MockFrameSourceHandle};
