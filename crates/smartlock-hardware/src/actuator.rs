//! Lock actuator.
//!
//! [`LockActuator`] owns the physical lock output and its cached state. It
//! only drives the output on a real transition, and pairs every transition
//! with its sound cue.

use crate::error::{HardwareError, Result};
use crate::sound::{SoundCoordinator, SoundCue};
use std::path::PathBuf;
use tracing::{debug, info};

/// Output level of a closed lock.
pub const LEVEL_CLOSED: u8 = 1;

/// Output level of an open lock.
pub const LEVEL_OPEN: u8 = 0;

/// Physical lock output.
pub trait LockDriver: Send {
    /// Drive the lock closed (`true`) or open (`false`).
    fn drive(&mut self, closed: bool) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Whether an actuator call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// The output was driven.
    Performed,
    /// The lock already was in the requested state.
    NoOp,
}

/// Lock output with cached state.
pub struct LockActuator {
    driver: Box<dyn LockDriver>,
    closed: bool,
}

impl LockActuator {
    /// Create an actuator and drive the lock closed.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the output cannot be
    /// driven.
    pub fn new(driver: impl LockDriver + 'static) -> Result<Self> {
        let mut driver: Box<dyn LockDriver> = Box::new(driver);
        driver.drive(true).map_err(|e| {
            HardwareError::initialization_failed(format!("{}: {e}", driver.name()))
        })?;
        info!(driver = driver.name(), "Lock initialized closed");

        Ok(Self {
            driver,
            closed: true,
        })
    }

    /// Returns `true` if the lock is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open the lock.
    ///
    /// Stops the ambient loop and plays the granted cue. No-op if already open.
    ///
    /// # Errors
    ///
    /// Returns the driver error; the cached state is left unchanged.
    pub fn open(&mut self, sound: &mut dyn SoundCoordinator) -> Result<Actuation> {
        if !self.closed {
            debug!("Lock already open");
            return Ok(Actuation::NoOp);
        }

        self.driver.drive(false)?;
        self.closed = false;
        sound.stop_ambient();
        sound.play(SoundCue::Granted);
        info!("Lock opened");
        Ok(Actuation::Performed)
    }

    /// Close the lock.
    ///
    /// Plays the closing cue. No-op if already closed.
    ///
    /// # Errors
    ///
    /// Returns the driver error; the cached state is left unchanged.
    pub fn close(&mut self, sound: &mut dyn SoundCoordinator) -> Result<Actuation> {
        if self.closed {
            debug!("Lock already closed");
            return Ok(Actuation::NoOp);
        }

        self.driver.drive(true)?;
        self.closed = true;
        sound.play(SoundCue::Ambient);
        info!("Lock closed");
        Ok(Actuation::Performed)
    }

    /// Drive the lock closed regardless of the cached state.
    ///
    /// Used on shutdown, without sound.
    pub fn secure(&mut self) -> Result<()> {
        self.driver.drive(true)?;
        self.closed = true;
        info!("Lock secured");
        Ok(())
    }
}

impl std::fmt::Debug for LockActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockActuator")
            .field("driver", &self.driver.name())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Lock output on a sysfs GPIO value file.
#[derive(Debug, Clone)]
pub struct SysfsGpioDriver {
    value_path: PathBuf,
    name: String,
}

impl SysfsGpioDriver {
    /// Driver for GPIO `pin` under `/sys/class/gpio`.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the pin is not
    /// exported.
    pub fn new(pin: u8) -> Result<Self> {
        Self::with_value_path(format!("/sys/class/gpio/gpio{pin}/value"))
    }

    /// Driver writing to an explicit value file.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the file does not
    /// exist.
    pub fn with_value_path(value_path: impl Into<PathBuf>) -> Result<Self> {
        let value_path = value_path.into();
        if !value_path.exists() {
            return Err(HardwareError::initialization_failed(format!(
                "GPIO value file {} not found",
                value_path.display()
            )));
        }
        let name = value_path.display().to_string();
        Ok(Self { value_path, name })
    }
}

impl LockDriver for SysfsGpioDriver {
    fn drive(&mut self, closed: bool) -> Result<()> {
        let level = if closed { LEVEL_CLOSED } else { LEVEL_OPEN };
        std::fs::write(&self.value_path, level.to_string())?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Driver that only logs, for hosts without a lock output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDriver;

impl LockDriver for LoggingDriver {
    fn drive(&mut self, closed: bool) -> Result<()> {
        info!(closed, "Lock output (simulated)");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
