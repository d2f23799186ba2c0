//! Configuration snapshot consumed by the controller.
//!
//! The snapshot is loaded, persisted and merged by an external collaborator.
//! The controller only reads it and publishes deltas back through events.

use crate::{
    Result,
    constants::MAX_AUTO_CLOSE_SECS,
    error::Error,
    types::AccessList,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lock configuration snapshot.
///
/// Missing fields fall back to the minimal running configuration: closed,
/// sound on, not blocked, empty access list.
///
/// # Examples
///
/// ```
/// use smartlock_core::LockConfig;
///
/// let config: LockConfig = toml::from_str(r#"
///     pin = 7
///     timer = 10
///     card_list = "A1B2;C3D4"
/// "#).unwrap();
///
/// assert_eq!(config.acl.len(), 2);
/// assert!(config.closed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Controller instance identifier, attached to state-change events.
    pub uid: Option<String>,

    /// Logical actuator pin.
    pub pin: u8,

    /// Default alert level attached to denial alerts.
    pub alert: i32,

    /// Root of the audio assets, only used by the sound subsystem.
    pub sound_dir: Option<PathBuf>,

    /// Auto-close delay in seconds, `<= 0` keeps the lock open until closed again.
    pub timer: i64,

    /// Authorized codes.
    #[serde(alias = "card_list")]
    pub acl: AccessList,

    /// Lock is closed.
    pub closed: bool,

    /// Lock is blocked.
    pub blocked: bool,

    /// Audio feedback is enabled.
    pub sound: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            uid: None,
            pin: 0,
            alert: 0,
            sound_dir: None,
            timer: 0,
            acl: AccessList::new(),
            closed: true,
            blocked: false,
            sound: true,
        }
    }
}

impl LockConfig {
    /// Validate values the controller cannot work with.
    ///
    /// # Errors
    /// Returns `Error::Config` if the uid is blank or the auto-close delay is
    /// larger than [`MAX_AUTO_CLOSE_SECS`].
    pub fn validate(&self) -> Result<()> {
        if let Some(uid) = &self.uid
            && uid.trim().is_empty()
        {
            return Err(Error::Config("uid must not be blank".to_string()));
        }

        if self.timer > MAX_AUTO_CLOSE_SECS {
            return Err(Error::Config(format!(
                "timer must be at most {MAX_AUTO_CLOSE_SECS}s, got {}",
                self.timer
            )));
        }

        Ok(())
    }
}
