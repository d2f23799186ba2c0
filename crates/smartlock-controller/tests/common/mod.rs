//! Common test utilities for controller integration tests.
//!
//! [`Harness`] wires a [`ControlLoop`] to mock devices and keeps the test
//! side of every channel:
//!
//! - `frames`: push serial lines as the reader would
//! - `events`: inspect what the loop reported
//! - `driver` / `sound`: inspect the lock output and the cues played
//! - `clock`: move time for the auto-close timer
//! - `config`: publish new configuration snapshots

#![allow(dead_code)]

use serde_json::Value;
use smartlock_controller::{ControlLoop, ControllerConfig, Tick};
use smartlock_core::{AccessList, LockConfig, ManualClock};
use smartlock_hardware::LockActuator;
use smartlock_hardware::mock::{MockLockDriver, MockLockDriverHandle, MockSound, MockSoundHandle};
use smartlock_protocol::{DeviceEvent, EventCommand, RawFrame};
use tokio::sync::{mpsc, watch};

pub const TEST_UID: &str = "lock-test";
pub const START_TIME: u64 = 1_700_000_000;
pub const AUTO_CLOSE_SECS: i64 = 5;

pub struct Harness {
    pub control: ControlLoop,
    pub frames: mpsc::UnboundedSender<RawFrame>,
    pub events: mpsc::UnboundedReceiver<DeviceEvent>,
    pub driver: MockLockDriverHandle,
    pub sound: MockSoundHandle,
    pub clock: ManualClock,
    pub config: watch::Sender<LockConfig>,
}

/// Snapshot with uid, timer and the given access list.
pub fn lock_config(acl: &str) -> LockConfig {
    LockConfig {
        uid: Some(TEST_UID.to_string()),
        timer: AUTO_CLOSE_SECS,
        alert: 1,
        acl: AccessList::from_joined(acl),
        ..LockConfig::default()
    }
}

/// Loop settings without settle delay.
pub fn fast_settings() -> ControllerConfig {
    ControllerConfig {
        idle_sleep_ms: 1,
        settle_delay_ms: 0,
        ..ControllerConfig::default()
    }
}

impl Harness {
    pub fn new(config: LockConfig) -> Self {
        Self::with_settings(config, fast_settings())
    }

    pub fn with_settings(config: LockConfig, settings: ControllerConfig) -> Self {
        let (driver, driver_handle) = MockLockDriver::new();
        let (sound, sound_handle) = MockSound::new();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (config_tx, config_rx) = watch::channel(config.clone());
        let clock = ManualClock::new(START_TIME);

        let actuator = LockActuator::new(driver).expect("mock driver never fails on init");
        let control = ControlLoop::builder(config)
            .with_settings(settings)
            .with_clock(clock.clone())
            .with_config_updates(config_rx)
            .build(actuator, Box::new(sound), frames_rx, events_tx)
            .expect("valid test configuration");

        Self {
            control,
            frames: frames_tx,
            events: events_rx,
            driver: driver_handle,
            sound: sound_handle,
            clock,
            config: config_tx,
        }
    }

    /// Queue one serial line.
    pub fn send(&self, line: &'static str) {
        self.frames.send(RawFrame::from(line)).expect("loop alive");
    }

    /// Queue a keypad entry followed by the submit key.
    pub fn type_code(&self, code: &str) {
        for digit in code.chars() {
            let line = format!("01KB{digit}\n");
            self.frames.send(RawFrame::from(line.into_bytes())).expect("loop alive");
        }
        self.send("01KB11\n");
    }

    /// Queue a card scan.
    pub fn scan_card(&self, code: &str) {
        let line = format!("01CD{code}\n");
        self.frames.send(RawFrame::from(line.into_bytes())).expect("loop alive");
    }

    /// Tick until the queue is empty.
    pub async fn drain(&mut self) {
        while self.control.tick().await == Tick::Processed {}
    }

    /// Events emitted so far.
    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Publish a new configuration snapshot.
    pub fn publish(&self, update: impl FnOnce(&mut LockConfig)) {
        self.config.send_modify(update);
    }
}

/// Payloads of the `input` events in `events`.
pub fn input_payloads(events: &[DeviceEvent]) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e.command == EventCommand::Input)
        .filter_map(|e| e.payload.clone())
        .collect()
}

/// Payloads of the `send` events in `events`.
pub fn send_payloads(events: &[DeviceEvent]) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e.command == EventCommand::Send)
        .filter_map(|e| e.payload.clone())
        .collect()
}

/// Assert `events` holds exactly one `input` event and that it reports
/// `closed`.
pub fn assert_single_input(events: &[DeviceEvent], closed: bool) -> Value {
    let inputs = input_payloads(events);
    assert_eq!(inputs.len(), 1, "expected one input event, got {inputs:?}");
    let payload = inputs[0].clone();
    assert_eq!(payload["closed"], closed);
    assert_eq!(payload["uid"], TEST_UID);
    payload
}
