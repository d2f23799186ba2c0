//! The lock control loop.
//!
//! A single cooperative task owns the lock state, the timers, the actuator
//! and the sound capability. Each iteration:
//!
//! 1. picks up a newer configuration snapshot, if one was published
//! 2. reconciles the ambient sound with the lock state
//! 3. while blocked, discards at most one queued frame and stops there
//! 4. while open, closes the lock once the auto-close timer is due
//! 5. takes at most one frame from the queue and acts on it
//!
//! Failures caused by a frame are logged and resolved to a denial, they
//! never end the loop. State changes are reported as deltas: a field is only
//! sent when it differs from what was last reported.
//!
//! # Examples
//!
//! ```
//! use smartlock_controller::{ControlLoop, ControllerConfig, Tick};
//! use smartlock_core::{AccessList, LockConfig};
//! use smartlock_hardware::LockActuator;
//! use smartlock_hardware::mock::{MockLockDriver, MockSound};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = LockConfig {
//!     acl: AccessList::from_joined("1234"),
//!     ..LockConfig::default()
//! };
//! let (driver, _) = MockLockDriver::new();
//! let (sound, _) = MockSound::new();
//! let (frames_tx, frames_rx) = mpsc::unbounded_channel();
//! let (events_tx, _events_rx) = mpsc::unbounded_channel();
//!
//! let mut control = ControlLoop::builder(config)
//!     .with_settings(ControllerConfig { settle_delay_ms: 0, ..ControllerConfig::default() })
//!     .build(LockActuator::new(driver).unwrap(), Box::new(sound), frames_rx, events_tx)
//!     .unwrap();
//!
//! for line in ["01KB1\n", "01KB2\n", "01KB3\n", "01KB4\n", "01KB11\n"] {
//!     frames_tx.send(line.into()).unwrap();
//! }
//! while control.tick().await == Tick::Processed {}
//!
//! assert!(!control.state().closed);
//! # }
//! ```

use crate::access::{AccessDecision, AccessEvaluator, DenialReason, UnlockAttemptLog};
use crate::error::Result;
use crate::settings::ControllerConfig;
use smartlock_core::constants::SYSTEM_IDENT;
use smartlock_core::{AccessCode, Clock, LockConfig, LockState, SystemClock, TimerRegistry};
use smartlock_hardware::{Actuation, LockActuator, SoundCoordinator, SoundCue};
use smartlock_protocol::{DecodedInput, DeviceEvent, InputDecoder, RawFrame, StateDelta};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No frame was waiting.
    Idle,
    /// A frame was taken from the queue.
    Processed,
}

/// Single-threaded lock controller.
pub struct ControlLoop {
    uid: String,
    state: LockState,
    settings: ControllerConfig,

    decoder: InputDecoder,
    evaluator: AccessEvaluator,
    timers: TimerRegistry,
    clock: Arc<dyn Clock>,

    actuator: LockActuator,
    sound: Box<dyn SoundCoordinator>,

    frames: mpsc::UnboundedReceiver<RawFrame>,
    events: mpsc::UnboundedSender<DeviceEvent>,
    updates: Option<watch::Receiver<LockConfig>>,

    /// Last state reported through an `input` event.
    reported: StateDelta,

    input_closed: bool,
    events_closed: bool,
}

impl ControlLoop {
    /// Start building a loop for the `config` snapshot.
    pub fn builder(config: LockConfig) -> ControlLoopBuilder {
        ControlLoopBuilder {
            config,
            settings: ControllerConfig::default(),
            clock: Arc::new(SystemClock),
            updates: None,
        }
    }

    /// Controller uid attached to every `input` event.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Current lock state.
    pub fn state(&self) -> &LockState {
        &self.state
    }

    /// Armed timers.
    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Refused attempts so far.
    pub fn attempts(&self) -> &UnlockAttemptLog {
        self.evaluator.attempts()
    }

    /// Keypad digits typed so far.
    pub fn keypad_buffer(&self) -> &str {
        self.decoder.buffer().as_str()
    }

    /// Announce the controller on the event bus.
    pub fn start(&mut self) {
        info!(
            uid = %self.uid,
            closed = self.state.closed,
            blocked = self.state.blocked,
            "Control loop starting"
        );
        self.emit(DeviceEvent::reload());
    }

    /// Run until `cancel` fires, then secure the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be secured on the way out.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.start();

        while !cancel.is_cancelled() {
            match self.tick().await {
                Tick::Processed => tokio::task::yield_now().await,
                Tick::Idle => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.settings.idle_sleep()) => {}
                    }
                }
            }
        }

        self.shutdown()
    }

    /// Run one iteration.
    pub async fn tick(&mut self) -> Tick {
        self.poll_updates();
        self.sound.reconcile(self.state.closed, self.state.sound_enabled);

        if self.state.blocked {
            return self.discard_frame();
        }

        if !self.state.closed
            && self
                .timers
                .check(&self.settings.auto_close_timer, self.clock.now_secs())
        {
            info!("Auto-close timer expired");
            self.close_lock(SYSTEM_IDENT);
        }

        match self.frames.try_recv() {
            Ok(frame) => {
                self.handle_frame(&frame).await;
                Tick::Processed
            }
            Err(TryRecvError::Empty) => Tick::Idle,
            Err(TryRecvError::Disconnected) => {
                if !self.input_closed {
                    warn!("Frame queue closed, no more panel input");
                    self.input_closed = true;
                }
                Tick::Idle
            }
        }
    }

    /// Stop the ambient sound and drive the lock closed.
    ///
    /// # Errors
    ///
    /// Returns the actuator error if the lock cannot be secured.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Control loop stopping, securing lock");
        self.sound.stop_ambient();
        self.timers.clear(&self.settings.auto_close_timer);
        self.actuator.secure()?;
        self.state.closed = true;
        Ok(())
    }

    fn poll_updates(&mut self) {
        let Some(updates) = self.updates.as_mut() else {
            return;
        };

        match updates.has_changed() {
            Ok(true) => {
                let config = updates.borrow_and_update().clone();
                self.apply_snapshot(&config);
            }
            Ok(false) => {}
            Err(_) => {
                debug!("Configuration source closed");
                self.updates = None;
            }
        }
    }

    /// Refresh the state from a newer snapshot.
    ///
    /// The external side already knows the snapshot, so nothing is reported.
    fn apply_snapshot(&mut self, config: &LockConfig) {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Ignoring invalid configuration snapshot");
            return;
        }

        debug!(
            closed = config.closed,
            blocked = config.blocked,
            sound = config.sound,
            codes = config.acl.len(),
            "Configuration snapshot refreshed"
        );
        self.state.refresh(config);

        if config.closed != self.state.closed {
            let result = if config.closed {
                self.actuator.close(self.sound.as_mut())
            } else {
                self.actuator.open(self.sound.as_mut())
            };

            match result {
                Ok(_) => {
                    self.state.closed = self.actuator.is_closed();
                    self.timers.clear(&self.settings.auto_close_timer);
                    self.decoder.clear_buffer();
                }
                Err(e) => error!(error = %e, closed = config.closed, "Failed to apply snapshot lock state"),
            }
        }

        self.reported.merge(
            &StateDelta::default()
                .closed(self.state.closed)
                .blocked(self.state.blocked)
                .sound(self.state.sound_enabled),
        );
    }

    fn discard_frame(&mut self) -> Tick {
        match self.frames.try_recv() {
            Ok(frame) => {
                debug!(len = frame.len(), "Lock blocked, discarding frame");
                Tick::Processed
            }
            Err(_) => Tick::Idle,
        }
    }

    async fn handle_frame(&mut self, frame: &RawFrame) {
        let input = match self.decoder.decode(frame) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Discarding malformed frame");
                self.sound.play(SoundCue::Denied);
                return;
            }
        };

        match input {
            DecodedInput::Accumulate if !self.state.closed => {
                // only the submit key acts on an open lock
                self.decoder.clear_buffer();
                debug!("Lock open, keypad digit ignored");
            }
            DecodedInput::Accumulate => debug!(len = self.decoder.buffer().len(), "Keypad digit"),
            DecodedInput::ClearBuffer => debug!("Keypad entry cleared"),
            DecodedInput::Suppressed => debug!("Duplicate card frame suppressed"),
            DecodedInput::Submit(code) | DecodedInput::CardScan(code) => {
                self.process_code(&code);
                self.settle().await;
            }
        }
    }

    fn process_code(&mut self, presented: &str) {
        match self.evaluator.evaluate(&self.state, presented) {
            AccessDecision::Granted(code) => {
                self.open_lock(code.as_str());
            }
            AccessDecision::ClosedByReentry(code) => {
                self.sound.play(SoundCue::Denied);
                let ident = code.as_ref().map_or(SYSTEM_IDENT, AccessCode::as_str);
                self.close_lock(ident);
            }
            AccessDecision::Denied { reason, .. } => {
                self.sound.play(SoundCue::Denied);
                if reason.raises_alert() {
                    self.raise_alert(presented.trim(), reason);
                }
            }
        }
    }

    fn raise_alert(&mut self, code: &str, reason: DenialReason) {
        let comment = match reason {
            DenialReason::EmptyAccessList => format!("badcode {code} ({reason})"),
            _ => format!("badcode {code}"),
        };
        self.emit(DeviceEvent::alert(self.state.alert_level, comment));
    }

    /// Let the panel settle, then end the transaction.
    async fn settle(&mut self) {
        let delay = self.settings.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.decoder.finish_transaction(Instant::now());
    }

    fn open_lock(&mut self, ident: &str) {
        match self.actuator.open(self.sound.as_mut()) {
            Ok(Actuation::Performed) => {
                self.state.closed = false;
                let now = self.clock.now_secs();
                match self
                    .timers
                    .arm(&self.settings.auto_close_timer, now, self.state.auto_close_secs)
                {
                    Some(expiry) => debug!(expiry, "Auto-close timer armed"),
                    None => debug!("Auto-close disabled, staying open"),
                }
                self.state_update(
                    StateDelta::default()
                        .closed(false)
                        .message(format!("lock open by {ident}")),
                );
            }
            Ok(Actuation::NoOp) => {}
            Err(e) => error!(error = %e, "Failed to open lock"),
        }
    }

    fn close_lock(&mut self, ident: &str) {
        match self.actuator.close(self.sound.as_mut()) {
            Ok(Actuation::Performed) => {
                self.state.closed = true;
                self.timers.clear(&self.settings.auto_close_timer);
                self.decoder.clear_buffer();
                self.state_update(
                    StateDelta::default()
                        .closed(true)
                        .message(format!("lock close by {ident}")),
                );
            }
            Ok(Actuation::NoOp) => {}
            Err(e) => error!(error = %e, "Failed to close lock"),
        }
    }

    /// Report the fields of `update` that changed since the last report.
    fn state_update(&mut self, update: StateDelta) {
        let delta = update.changes_from(&self.reported);
        if delta.is_empty() {
            return;
        }
        self.reported.merge(&delta);
        self.emit(DeviceEvent::input(&delta, &self.uid));
    }

    fn emit(&mut self, event: DeviceEvent) {
        debug!(command = %event.command, "Emitting event");
        if self.events.send(event).is_err() && !self.events_closed {
            warn!("Event receiver dropped, events are no longer delivered");
            self.events_closed = true;
        }
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("uid", &self.uid)
            .field("state", &self.state)
            .field("actuator", &self.actuator)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ControlLoop`].
pub struct ControlLoopBuilder {
    config: LockConfig,
    settings: ControllerConfig,
    clock: Arc<dyn Clock>,
    updates: Option<watch::Receiver<LockConfig>>,
}

impl ControlLoopBuilder {
    /// Set the loop timing.
    pub fn with_settings(mut self, settings: ControllerConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Set the clock used by the auto-close timer.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Follow configuration snapshots published on `updates`.
    ///
    /// The value current at build time is treated as already applied.
    pub fn with_config_updates(mut self, updates: watch::Receiver<LockConfig>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Build the loop.
    ///
    /// The actuator is aligned with the snapshot: a snapshot saying the lock
    /// is open opens it here, without arming the auto-close timer.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Core` if the snapshot fails validation and
    /// `ControllerError::Hardware` if the lock cannot be opened to match it.
    pub fn build(
        self,
        mut actuator: LockActuator,
        mut sound: Box<dyn SoundCoordinator>,
        frames: mpsc::UnboundedReceiver<RawFrame>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Result<ControlLoop> {
        self.config.validate()?;

        let mut updates = self.updates;
        if let Some(rx) = updates.as_mut() {
            rx.borrow_and_update();
        }

        let uid = self
            .config
            .uid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let state = LockState::from_config(&self.config);
        if !state.closed {
            actuator.open(sound.as_mut())?;
        }
        let reported = StateDelta::default()
            .closed(state.closed)
            .blocked(state.blocked)
            .sound(state.sound_enabled);

        Ok(ControlLoop {
            uid,
            state,
            decoder: InputDecoder::with_buffer_limit(self.settings.max_buffer_len),
            settings: self.settings,
            evaluator: AccessEvaluator::new(),
            timers: TimerRegistry::new(),
            clock: self.clock,
            actuator,
            sound,
            frames,
            events,
            updates,
            reported,
            input_closed: false,
            events_closed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartlock_core::{AccessList, ManualClock};
    use smartlock_hardware::mock::{MockLockDriver, MockLockDriverHandle, MockSound, MockSoundHandle};

    struct Fixture {
        control: ControlLoop,
        frames: mpsc::UnboundedSender<RawFrame>,
        events: mpsc::UnboundedReceiver<DeviceEvent>,
        driver: MockLockDriverHandle,
        sound: MockSoundHandle,
    }

    fn fixture(config: LockConfig) -> Fixture {
        let (driver, driver_handle) = MockLockDriver::new();
        let (sound, sound_handle) = MockSound::new();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let control = ControlLoop::builder(config)
            .with_settings(ControllerConfig {
                settle_delay_ms: 0,
                ..ControllerConfig::default()
            })
            .with_clock(ManualClock::new(1_000))
            .build(LockActuator::new(driver).unwrap(), Box::new(sound), frames_rx, events_tx)
            .unwrap();

        Fixture {
            control,
            frames: frames_tx,
            events: events_rx,
            driver: driver_handle,
            sound: sound_handle,
        }
    }

    fn config(acl: &str) -> LockConfig {
        LockConfig {
            uid: Some("lock-01".to_string()),
            timer: 5,
            acl: AccessList::from_joined(acl),
            ..LockConfig::default()
        }
    }

    #[tokio::test]
    async fn test_start_emits_reload() {
        let mut f = fixture(config("1234"));
        f.control.start();

        let event = f.events.try_recv().unwrap();
        assert_eq!(event, DeviceEvent::reload());
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_build_opens_when_snapshot_open() {
        let f = fixture(LockConfig {
            closed: false,
            ..config("1234")
        });

        assert_eq!(f.driver.writes(), vec![true, false]);
        assert!(f.control.timers().is_empty());
    }

    #[tokio::test]
    async fn test_open_snapshot_closes_without_start() {
        let mut f = fixture(LockConfig {
            closed: false,
            ..config("1234")
        });
        f.frames.send("01KB11\n".into()).unwrap();

        assert_eq!(f.control.tick().await, Tick::Processed);
        assert!(f.control.state().closed);
        assert_eq!(f.driver.writes(), vec![true, false, true]);
    }

    #[test]
    fn test_build_fails_when_lock_cannot_open() {
        let (driver, driver_handle) = MockLockDriver::new();
        let (sound, _) = MockSound::new();
        let (_, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = mpsc::unbounded_channel();
        let actuator = LockActuator::new(driver).unwrap();
        driver_handle.fail_next();

        let result = ControlLoop::builder(LockConfig {
            closed: false,
            ..config("1234")
        })
        .build(actuator, Box::new(sound), frames_rx, events_tx);

        assert!(matches!(result, Err(crate::ControllerError::Hardware(_))));
    }

    #[tokio::test]
    async fn test_digits_ignored_while_open() {
        let mut f = fixture(config("1234"));
        f.frames.send("01CD1234\n".into()).unwrap();
        f.control.tick().await;
        assert!(!f.control.state().closed);

        f.frames.send("01KB5\n".into()).unwrap();
        f.control.tick().await;
        assert_eq!(f.control.keypad_buffer(), "");
    }

    #[tokio::test]
    async fn test_idle_tick() {
        let mut f = fixture(config("1234"));
        assert_eq!(f.control.tick().await, Tick::Idle);
        assert!(f.sound.is_ambient_playing());
    }

    #[tokio::test]
    async fn test_keypad_digits_accumulate() {
        let mut f = fixture(config("1234"));
        f.frames.send("01KB1\n".into()).unwrap();
        f.frames.send("01KB2\n".into()).unwrap();

        f.control.tick().await;
        f.control.tick().await;
        assert_eq!(f.control.keypad_buffer(), "12");
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_plays_denial() {
        let mut f = fixture(config("1234"));
        f.frames.send("garbage\n".into()).unwrap();

        assert_eq!(f.control.tick().await, Tick::Processed);
        assert_eq!(f.sound.cues(), vec![SoundCue::Denied]);
        assert!(f.control.state().closed);
    }

    #[tokio::test]
    async fn test_unknown_code_raises_alert() {
        let mut f = fixture(LockConfig {
            alert: 3,
            ..config("1234")
        });
        f.frames.send("01CD9999\n".into()).unwrap();
        f.control.tick().await;

        let event = f.events.try_recv().unwrap();
        assert_eq!(
            event,
            DeviceEvent::alert(3, "badcode 9999"),
        );
        assert_eq!(f.control.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_secures_lock() {
        let mut f = fixture(config("1234"));
        f.frames.send("01CD1234\n".into()).unwrap();
        f.control.tick().await;
        assert!(!f.control.state().closed);

        f.control.shutdown().unwrap();
        assert!(f.control.state().closed);
        assert_eq!(f.driver.last_write(), Some(true));
        assert!(f.control.timers().is_empty());
    }

    #[tokio::test]
    async fn test_generated_uid() {
        let f = fixture(LockConfig {
            uid: None,
            ..config("1234")
        });
        assert!(Uuid::parse_str(f.control.uid()).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (driver, _) = MockLockDriver::new();
        let (sound, _) = MockSound::new();
        let (_, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = mpsc::unbounded_channel();

        let result = ControlLoop::builder(LockConfig {
            uid: Some("  ".to_string()),
            ..LockConfig::default()
        })
        .build(LockActuator::new(driver).unwrap(), Box::new(sound), frames_rx, events_tx);

        assert!(matches!(result, Err(crate::ControllerError::Core(_))));
    }
}
