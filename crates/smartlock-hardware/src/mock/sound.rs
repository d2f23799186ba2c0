//! Mock sound backend.

use crate::sound::{SoundCoordinator, SoundCue};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct SoundState {
    cues: Vec<SoundCue>,
    enabled: bool,
    ambient: bool,
    ambient_starts: usize,
}

/// Sound backend recording what it was asked to play.
#[derive(Debug)]
pub struct MockSound {
    state: Arc<Mutex<SoundState>>,
}

impl MockSound {
    /// Create an enabled backend and its handle.
    pub fn new() -> (Self, MockSoundHandle) {
        let state = Arc::new(Mutex::new(SoundState {
            cues: Vec::new(),
            enabled: true,
            ambient: false,
            ambient_starts: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSoundHandle { state },
        )
    }
}

fn lock(state: &Mutex<SoundState>) -> MutexGuard<'_, SoundState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SoundCoordinator for MockSound {
    fn play(&mut self, cue: SoundCue) {
        let mut state = lock(&self.state);
        if state.enabled {
            state.cues.push(cue);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        let mut state = lock(&self.state);
        state.enabled = enabled;
        if !enabled {
            state.ambient = false;
        }
    }

    fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    fn start_ambient(&mut self) {
        let mut state = lock(&self.state);
        if state.enabled && !state.ambient {
            state.ambient = true;
            state.ambient_starts += 1;
        }
    }

    fn stop_ambient(&mut self) {
        lock(&self.state).ambient = false;
    }

    fn is_ambient_playing(&self) -> bool {
        lock(&self.state).ambient
    }
}

/// Test-side handle of a [`MockSound`].
#[derive(Debug, Clone)]
pub struct MockSoundHandle {
    state: Arc<Mutex<SoundState>>,
}

impl MockSoundHandle {
    /// Cues played so far.
    pub fn cues(&self) -> Vec<SoundCue> {
        lock(&self.state).cues.clone()
    }

    /// Returns `true` if playback is enabled.
    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// Returns `true` while the ambient loop plays.
    pub fn is_ambient_playing(&self) -> bool {
        lock(&self.state).ambient
    }

    /// Number of times the ambient loop was started.
    pub fn ambient_starts(&self) -> usize {
        lock(&self.state).ambient_starts
    }
}
