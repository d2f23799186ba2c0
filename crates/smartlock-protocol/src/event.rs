//! Events published toward the external event bus.
//!
//! Every event belongs to the `device` category and carries one of three
//! commands:
//!
//! - `reload` - sent once when the controller starts, no payload
//! - `input` - a state delta plus the controller uid
//! - `send` - diagnostic or alert payload
//!
//! # Examples
//!
//! ```
//! use smartlock_protocol::{DeviceEvent, EventCommand, StateDelta};
//!
//! let delta = StateDelta::default().closed(false).message("lock open by system");
//! let event = DeviceEvent::input(&delta, "lock-01");
//!
//! assert_eq!(event.command, EventCommand::Input);
//! let payload = event.payload.unwrap();
//! assert_eq!(payload["closed"], false);
//! assert_eq!(payload["uid"], "lock-01");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smartlock_core::constants::EVENT_CATEGORY_DEVICE;

/// Command of a device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCommand {
    /// Controller (re)started.
    Reload,
    /// Lock state changed.
    Input,
    /// Diagnostic or alert message.
    Send,
}

impl std::fmt::Display for EventCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reload => write!(f, "reload"),
            Self::Input => write!(f, "input"),
            Self::Send => write!(f, "send"),
        }
    }
}

/// Event handed to the event-bus collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Event category, always `device`.
    pub category: String,

    /// Event command.
    pub command: EventCommand,

    /// Command payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl DeviceEvent {
    fn new(command: EventCommand, payload: Option<Value>) -> Self {
        Self {
            category: EVENT_CATEGORY_DEVICE.to_string(),
            command,
            payload,
        }
    }

    /// Startup event.
    pub fn reload() -> Self {
        Self::new(EventCommand::Reload, None)
    }

    /// State-change event for `delta`, tagged with the controller `uid`.
    pub fn input(delta: &StateDelta, uid: &str) -> Self {
        let mut payload = serde_json::to_value(delta).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut payload {
            map.insert("uid".to_string(), Value::String(uid.to_string()));
        }
        Self::new(EventCommand::Input, Some(payload))
    }

    /// Diagnostic message.
    pub fn send(payload: Value) -> Self {
        Self::new(EventCommand::Send, Some(payload))
    }

    /// Alert raised by a refused code.
    pub fn alert(level: i32, comment: impl Into<String>) -> Self {
        Self::send(json!({
            "message": "alert",
            "level": level,
            "comment": comment.into(),
        }))
    }
}

/// Lock state fields reported to the event bus.
///
/// Used both as the last reported state and as the delta of an update:
/// `None` fields are unchanged and never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StateDelta {
    /// Set `closed`.
    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    /// Set `blocked`.
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = Some(blocked);
        self
    }

    /// Set `sound`.
    pub fn sound(mut self, sound: bool) -> Self {
        self.sound = Some(sound);
        self
    }

    /// Set `message`.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Fields of `self` that differ from `reported`.
    pub fn changes_from(&self, reported: &StateDelta) -> StateDelta {
        fn changed<T: PartialEq + Clone>(new: &Option<T>, old: &Option<T>) -> Option<T> {
            new.as_ref().filter(|v| old.as_ref() != Some(*v)).cloned()
        }

        StateDelta {
            closed: changed(&self.closed, &reported.closed),
            blocked: changed(&self.blocked, &reported.blocked),
            sound: changed(&self.sound, &reported.sound),
            message: changed(&self.message, &reported.message),
        }
    }

    /// Overwrite the fields set in `delta`.
    pub fn merge(&mut self, delta: &StateDelta) {
        if delta.closed.is_some() {
            self.closed = delta.closed;
        }
        if delta.blocked.is_some() {
            self.blocked = delta.blocked;
        }
        if delta.sound.is_some() {
            self.sound = delta.sound;
        }
        if delta.message.is_some() {
            self.message.clone_from(&delta.message);
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.closed.is_none() && self.blocked.is_none() && self.sound.is_none() && self.message.is_none()
    }
}
