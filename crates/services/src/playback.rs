//! Video player seam.
//!
//! The engine never reaches for a global player API; a session receives its
//! adapter from an injected [`PlaybackAdapterFactory`], and the adapter reports
//! readiness and state changes through the event sender it was created with.

use std::sync::{Arc, Mutex};

use lesson_core::model::MediaRef;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::PlaybackError;

/// Player state as reported by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Unstarted,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ready,
    StateChange(PlayerState),
}

/// Wraps one embedded player instance.
pub trait VideoPlaybackAdapter: Send {
    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot load the media.
    fn load(&mut self, media: &MediaRef) -> Result<(), PlaybackError>;

    /// Current playback position in seconds.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot be queried.
    fn current_time(&self) -> Result<f64, PlaybackError>;

    /// Media length in seconds; `0.0` while unknown.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot be queried.
    fn duration(&self) -> Result<f64, PlaybackError>;

    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot be queried.
    fn player_state(&self) -> Result<PlayerState, PlaybackError>;

    /// # Errors
    ///
    /// Returns `PlaybackError` if the seek is rejected.
    fn seek_to(&mut self, seconds: f64) -> Result<(), PlaybackError>;

    /// Release the player. Must be safe to call more than once.
    fn destroy(&mut self);
}

/// Creates a player bound to the given event sender.
pub trait PlaybackAdapterFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns `PlaybackError` if no player can be initialised.
    fn create(
        &self,
        events: UnboundedSender<PlaybackEvent>,
    ) -> Result<Box<dyn VideoPlaybackAdapter>, PlaybackError>;
}

//
// ─── SCRIPTED PLAYER ───────────────────────────────────────────────────────────
//

/// Headless player driven by hand, for tests and non-UI hosts.
///
/// Clones share state, so a test keeps one clone as a remote control while the
/// session owns another as its adapter.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlayer {
    inner: Arc<Mutex<ScriptedState>>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    loaded: Option<MediaRef>,
    position: f64,
    duration: f64,
    state: Option<PlayerState>,
    seeks: Vec<f64>,
    destroyed: bool,
    fail_create: bool,
    fail_queries: bool,
    events: Option<UnboundedSender<PlaybackEvent>>,
}

impl ScriptedPlayer {
    #[must_use]
    pub fn new(duration_secs: f64) -> Self {
        let player = Self::default();
        player.with_state(|s| s.duration = duration_secs);
        player
    }

    /// The factory refuses to create a player.
    #[must_use]
    pub fn failing_init(self) -> Self {
        self.with_state(|s| s.fail_create = true);
        self
    }

    /// Every query and control call fails from now on.
    pub fn break_controls(&self) {
        self.with_state(|s| s.fail_queries = true);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScriptedState) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(tx) = self.with_state(|s| s.events.clone()) {
            let _ = tx.send(event);
        }
    }

    pub fn ready(&self) {
        self.emit(PlaybackEvent::Ready);
    }

    pub fn play(&self) {
        self.set_state(PlayerState::Playing);
    }

    pub fn pause(&self) {
        self.set_state(PlayerState::Paused);
    }

    /// Jump to the end and report `Ended`.
    pub fn finish(&self) {
        self.with_state(|s| s.position = s.duration);
        self.set_state(PlayerState::Ended);
    }

    fn set_state(&self, state: PlayerState) {
        self.with_state(|s| s.state = Some(state));
        self.emit(PlaybackEvent::StateChange(state));
    }

    /// Move the playhead forward, stopping at the end.
    pub fn advance(&self, secs: f64) {
        self.with_state(|s| s.position = (s.position + secs).min(s.duration));
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.with_state(|s| s.position)
    }

    #[must_use]
    pub fn seeks(&self) -> Vec<f64> {
        self.with_state(|s| s.seeks.clone())
    }

    #[must_use]
    pub fn loaded(&self) -> Option<MediaRef> {
        self.with_state(|s| s.loaded.clone())
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.with_state(|s| s.destroyed)
    }

    fn check(&self, op: &'static str) -> Result<(), PlaybackError> {
        if self.with_state(|s| s.fail_queries || s.destroyed) {
            return Err(PlaybackError::control(op, "player not usable"));
        }
        Ok(())
    }
}

impl PlaybackAdapterFactory for ScriptedPlayer {
    fn create(
        &self,
        events: UnboundedSender<PlaybackEvent>,
    ) -> Result<Box<dyn VideoPlaybackAdapter>, PlaybackError> {
        let refuse = self.with_state(|s| {
            if s.fail_create {
                return true;
            }
            s.events = Some(events);
            s.destroyed = false;
            s.state = Some(PlayerState::Unstarted);
            false
        });
        if refuse {
            return Err(PlaybackError::Unavailable("scripted init failure".into()));
        }
        Ok(Box::new(self.clone()))
    }
}

impl VideoPlaybackAdapter for ScriptedPlayer {
    fn load(&mut self, media: &MediaRef) -> Result<(), PlaybackError> {
        self.check("load")?;
        self.with_state(|s| s.loaded = Some(media.clone()));
        Ok(())
    }

    fn current_time(&self) -> Result<f64, PlaybackError> {
        self.check("current_time")?;
        Ok(self.position())
    }

    fn duration(&self) -> Result<f64, PlaybackError> {
        self.check("duration")?;
        Ok(self.with_state(|s| s.duration))
    }

    fn player_state(&self) -> Result<PlayerState, PlaybackError> {
        self.check("player_state")?;
        Ok(self.with_state(|s| s.state.unwrap_or(PlayerState::Unstarted)))
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        self.check("seek_to")?;
        self.with_state(|s| {
            s.position = seconds.clamp(0.0, s.duration);
            s.seeks.push(seconds);
        });
        Ok(())
    }

    fn destroy(&mut self) {
        self.with_state(|s| {
            s.destroyed = true;
            s.events = None;
        });
    }
}
