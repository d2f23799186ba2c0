//! Configuration file for the `smartlock` binary.
//!
//! One TOML file with four tables:
//!
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [lock]
//! uid = "front-door"
//! pin = 17
//! timer = 5
//! acl = "1234;a1b2c3d4"
//!
//! [serial]
//! ports = ["/dev/ttyS1", "/dev/ttyAMA1"]
//!
//! [controller]
//! settle_delay_ms = 1000
//! ```
//!
//! Every table and field is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smartlock_controller::ControllerConfig;
use smartlock_core::LockConfig;
use smartlock_hardware::SerialConfig;
use std::path::Path;

/// General settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level filter, `RUST_LOG` takes precedence.
    pub log_level: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub lock: LockConfig,
    pub serial: SerialConfig,
    pub controller: ControllerConfig,
}

impl AppConfig {
    /// Parse a configuration document.
    pub fn from_toml(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document).context("Invalid configuration")?;
        config.lock.validate().context("Invalid [lock] table")?;
        Ok(config)
    }

    /// Load the configuration file at `path`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&document).with_context(|| format!("Failed to load {}", path.display()))
    }
}
