//! Sound feedback.
//!
//! The lock plays a short cue for every outcome and an ambient loop while it
//! is closed and sound is enabled. Sound is optional: when no backend can be
//! initialized the controller runs with [`SilentSound`].

use crate::error::{HardwareError, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Ambient loop failures in a row after which the loop is given up.
const MAX_AMBIENT_FAILURES: u32 = 3;

/// An ambient player exiting sooner than this counts as a failure.
const MIN_AMBIENT_RUNTIME: Duration = Duration::from_secs(1);

/// Cue played for a lock outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    /// Access granted, lock opening.
    Granted,
    /// Access refused.
    Denied,
    /// Lock closing.
    Ambient,
}

impl SoundCue {
    /// Asset file stem of the cue.
    pub fn asset(self) -> &'static str {
        match self {
            SoundCue::Granted => "off",
            SoundCue::Denied => "block",
            SoundCue::Ambient => "on",
        }
    }
}

/// Asset file stem of the ambient loop.
pub const AMBIENT_LOOP_ASSET: &str = "field";

/// Sound playback capability.
///
/// Playback failures are never reported to the caller: feedback must not
/// stall the lock.
pub trait SoundCoordinator: Send {
    /// Play a one-shot cue.
    fn play(&mut self, cue: SoundCue);

    /// Enable or disable playback. Disabling fades out everything playing.
    fn set_enabled(&mut self, enabled: bool);

    /// Returns `true` if playback is enabled.
    fn is_enabled(&self) -> bool;

    /// Start the ambient loop.
    fn start_ambient(&mut self);

    /// Stop the ambient loop.
    fn stop_ambient(&mut self);

    /// Returns `true` while the ambient loop plays.
    fn is_ambient_playing(&self) -> bool;

    /// Align playback with the lock state.
    ///
    /// The ambient loop plays exactly when the lock is `closed` and sound is
    /// `enabled`.
    fn reconcile(&mut self, closed: bool, enabled: bool) {
        if enabled != self.is_enabled() {
            self.set_enabled(enabled);
        }

        let wanted = closed && enabled;
        if wanted && !self.is_ambient_playing() {
            self.start_ambient();
        } else if !wanted && self.is_ambient_playing() {
            self.stop_ambient();
        }
    }
}

/// Backend that plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSound;

impl SoundCoordinator for SilentSound {
    fn play(&mut self, _cue: SoundCue) {}

    fn set_enabled(&mut self, _enabled: bool) {}

    fn is_enabled(&self) -> bool {
        false
    }

    fn start_ambient(&mut self) {}

    fn stop_ambient(&mut self) {}

    fn is_ambient_playing(&self) -> bool {
        false
    }

    // Nothing to align, skip the per-iteration checks.
    fn reconcile(&mut self, _closed: bool, _enabled: bool) {}
}

/// Use `backend` if it initialized, otherwise degrade to [`SilentSound`].
pub fn select_sound<S>(backend: Result<S>) -> Box<dyn SoundCoordinator>
where
    S: SoundCoordinator + 'static,
{
    match backend {
        Ok(sound) => Box::new(sound),
        Err(e) => {
            warn!(error = %e, "Sound unavailable, continuing without feedback");
            Box::new(SilentSound)
        }
    }
}

/// Backend playing WAV assets through an external player command.
///
/// Assets are looked up as `<sound_dir>/<stem>.wav`.
#[derive(Debug)]
pub struct PlayerSound {
    sound_dir: PathBuf,
    player: String,
    enabled: bool,
    cue: Option<Child>,
    ambient: Option<Child>,
    ambient_started: Instant,
    ambient_failures: u32,
    ambient_spawns: u32,
}

impl PlayerSound {
    /// Default player command.
    pub const DEFAULT_PLAYER: &'static str = "aplay";

    /// Create a backend over `sound_dir`.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the directory or one
    /// of the assets is missing.
    pub fn new(sound_dir: impl Into<PathBuf>, player: impl Into<String>) -> Result<Self> {
        let sound_dir = sound_dir.into();
        if !sound_dir.is_dir() {
            return Err(HardwareError::initialization_failed(format!(
                "sound directory {} not found",
                sound_dir.display()
            )));
        }

        let stems = [SoundCue::Granted, SoundCue::Denied, SoundCue::Ambient]
            .map(SoundCue::asset)
            .into_iter()
            .chain([AMBIENT_LOOP_ASSET]);
        for stem in stems {
            let path = asset_path(&sound_dir, stem);
            if !path.is_file() {
                return Err(HardwareError::initialization_failed(format!(
                    "sound asset {} not found",
                    path.display()
                )));
            }
        }

        Ok(Self {
            sound_dir,
            player: player.into(),
            enabled: true,
            cue: None,
            ambient: None,
            ambient_started: Instant::now(),
            ambient_failures: 0,
            ambient_spawns: 0,
        })
    }

    fn spawn(&self, stem: &str) -> Option<Child> {
        let path = asset_path(&self.sound_dir, stem);
        match Command::new(&self.player)
            .arg("-q")
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(player = %self.player, asset = %path.display(), error = %e, "Playback failed");
                None
            }
        }
    }

    /// Returns `true` once the ambient player kept failing.
    fn ambient_given_up(&self) -> bool {
        self.ambient_failures >= MAX_AMBIENT_FAILURES
    }

    fn record_ambient_failure(&mut self) {
        self.ambient_failures += 1;
        if self.ambient_given_up() {
            warn!(
                player = %self.player,
                failures = self.ambient_failures,
                "Ambient loop keeps failing, giving up until sound is re-enabled"
            );
        }
    }

    fn reap(&mut self) {
        if let Some(child) = self.ambient.as_mut()
            && let Ok(Some(status)) = child.try_wait()
        {
            self.ambient = None;
            if status.success() && self.ambient_started.elapsed() >= MIN_AMBIENT_RUNTIME {
                self.ambient_failures = 0;
            } else {
                debug!(%status, "Ambient player exited early");
                self.record_ambient_failure();
            }
            // restarted by `start_ambient` unless given up
        }
        if let Some(child) = self.cue.as_mut()
            && matches!(child.try_wait(), Ok(Some(_)))
        {
            self.cue = None;
        }
    }
}

fn asset_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.wav"))
}

fn stop_child(child: &mut Option<Child>) {
    if let Some(mut child) = child.take() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl SoundCoordinator for PlayerSound {
    fn play(&mut self, cue: SoundCue) {
        if !self.enabled {
            return;
        }
        stop_child(&mut self.cue);
        debug!(?cue, "Playing cue");
        self.cue = self.spawn(cue.asset());
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.ambient_failures = 0;
        }
        self.enabled = enabled;
        if !enabled {
            stop_child(&mut self.cue);
            stop_child(&mut self.ambient);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start_ambient(&mut self) {
        if !self.enabled || self.ambient.is_some() || self.ambient_given_up() {
            return;
        }
        self.ambient_spawns += 1;
        debug!(spawns = self.ambient_spawns, "Starting ambient loop");
        self.ambient_started = Instant::now();
        self.ambient = self.spawn(AMBIENT_LOOP_ASSET);
        if self.ambient.is_none() {
            self.record_ambient_failure();
        }
    }

    fn stop_ambient(&mut self) {
        stop_child(&mut self.ambient);
    }

    fn is_ambient_playing(&self) -> bool {
        self.ambient.is_some()
    }

    fn reconcile(&mut self, closed: bool, enabled: bool) {
        self.reap();
        if enabled != self.enabled {
            self.set_enabled(enabled);
        }
        let wanted = closed && enabled;
        if wanted && self.ambient.is_none() {
            self.start_ambient();
        } else if !wanted && self.ambient.is_some() {
            self.stop_ambient();
        }
    }
}

impl Drop for PlayerSound {
    fn drop(&mut self) {
        stop_child(&mut self.cue);
        stop_child(&mut self.ambient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSound;

    #[test]
    fn test_cue_assets() {
        assert_eq!(SoundCue::Granted.asset(), "off");
        assert_eq!(SoundCue::Denied.asset(), "block");
        assert_eq!(SoundCue::Ambient.asset(), "on");
    }

    #[test]
    fn test_reconcile_starts_ambient_when_closed() {
        let (mut sound, handle) = MockSound::new();
        sound.reconcile(true, true);
        assert!(handle.is_ambient_playing());

        sound.reconcile(false, true);
        assert!(!handle.is_ambient_playing());
    }

    #[test]
    fn test_reconcile_disabling_stops_ambient() {
        let (mut sound, handle) = MockSound::new();
        sound.reconcile(true, true);
        sound.reconcile(true, false);

        assert!(!handle.is_enabled());
        assert!(!handle.is_ambient_playing());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (mut sound, handle) = MockSound::new();
        sound.reconcile(true, true);
        sound.reconcile(true, true);
        assert_eq!(handle.ambient_starts(), 1);
    }

    #[test]
    fn test_select_sound_degrades() {
        let backend = PlayerSound::new("/nonexistent/sounds", PlayerSound::DEFAULT_PLAYER);
        assert!(backend.is_err());

        let mut sound = select_sound(backend);
        sound.play(SoundCue::Granted);
        assert!(!sound.is_enabled());
    }

    #[test]
    fn test_player_requires_all_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("off.wav"), b"").unwrap();

        let error = PlayerSound::new(dir.path(), "true").unwrap_err();
        assert!(error.to_string().contains("block.wav"));
    }

    fn sound_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for stem in ["off", "block", "on", "field"] {
            std::fs::write(dir.path().join(format!("{stem}.wav")), b"").unwrap();
        }
        dir
    }

    fn wait_for_exit(sound: &mut PlayerSound) {
        if let Some(child) = sound.ambient.as_mut() {
            let _ = child.wait();
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_failing_player_is_not_respawned_forever() {
        let dir = sound_dir();
        let mut sound = PlayerSound::new(dir.path(), "false").unwrap();

        for _ in 0..50 {
            sound.reconcile(true, true);
            wait_for_exit(&mut sound);
        }

        assert_eq!(sound.ambient_spawns, MAX_AMBIENT_FAILURES);
        assert!(sound.ambient_given_up());
        assert!(sound.is_enabled());
    }

    #[test]
    fn test_missing_player_is_not_respawned_forever() {
        let dir = sound_dir();
        let mut sound = PlayerSound::new(dir.path(), "/nonexistent/player").unwrap();

        for _ in 0..20 {
            sound.reconcile(true, true);
        }

        assert_eq!(sound.ambient_spawns, MAX_AMBIENT_FAILURES);
        assert!(!sound.is_ambient_playing());
    }

    #[test]
    #[cfg(unix)]
    fn test_reenabling_retries_ambient() {
        let dir = sound_dir();
        let mut sound = PlayerSound::new(dir.path(), "false").unwrap();
        for _ in 0..10 {
            sound.reconcile(true, true);
            wait_for_exit(&mut sound);
        }
        assert!(sound.ambient_given_up());

        sound.reconcile(true, false);
        sound.reconcile(true, true);

        assert_eq!(sound.ambient_spawns, MAX_AMBIENT_FAILURES + 1);
    }

    #[test]
    fn test_player_loads_complete_directory() {
        let dir = sound_dir();

        let mut sound = PlayerSound::new(dir.path(), "true").unwrap();
        assert!(sound.is_enabled());
        sound.set_enabled(false);
        sound.start_ambient();
        assert!(!sound.is_ambient_playing());
    }
}
