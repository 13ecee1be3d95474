use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lesson_core::model::{Lesson, ProgressPercent, ProgressRecord, ProgressUpdate};

use super::progress::{SessionState, WatchProgress};
use crate::config::{EngineConfig, TickWindow};
use crate::playback::PlayerState;

/// One reading of the player taken on a tick or before a flush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSample {
    pub position: f64,
    pub duration: f64,
    pub state: PlayerState,
}

/// A pending progress write and the watch counter it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushTicket {
    pub update: ProgressUpdate,
    watched: u32,
}

/// Watch-time bookkeeping for a single lesson, free of I/O.
///
/// The caller feeds it player events, tick instants and samples, and turns
/// its flush tickets into store writes.
#[derive(Debug, Clone)]
pub struct WatchTimeTracker {
    duration_seconds: u32,
    tick_window: TickWindow,
    resume_tail: Duration,
    state: SessionState,
    watched_seconds: u32,
    flushed_watched: u32,
    last_tick: Option<Instant>,
    resume_done: bool,
    /// Highest percent known to be persisted.
    floor: ProgressPercent,
    completed: bool,
    position: f64,
    media_duration: f64,
}

impl WatchTimeTracker {
    #[must_use]
    pub fn new(lesson: &Lesson, saved: Option<&ProgressRecord>, config: &EngineConfig) -> Self {
        Self {
            duration_seconds: lesson.duration_seconds(),
            tick_window: config.tick_window,
            resume_tail: config.resume_tail,
            state: SessionState::Uninitialized,
            watched_seconds: 0,
            flushed_watched: 0,
            last_tick: None,
            resume_done: false,
            floor: saved.map_or(ProgressPercent::ZERO, ProgressRecord::progress_percent),
            completed: saved.is_some_and(ProgressRecord::completed),
            position: 0.0,
            media_duration: 0.0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn watched_seconds(&self) -> u32 {
        self.watched_seconds
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// False once degraded or closed.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        !matches!(self.state, SessionState::Degraded | SessionState::Closed)
    }

    /// Handle a player `Ready` event.
    ///
    /// Returns the resume position to seek to, at most once per session, and
    /// only when the saved position is past the start and outside the tail
    /// window.
    pub fn on_ready(&mut self) -> Option<f64> {
        if !self.is_tracking() {
            return None;
        }
        if self.state == SessionState::Uninitialized {
            self.state = SessionState::Ready;
        }
        if self.resume_done {
            return None;
        }
        self.resume_done = true;

        let target = self.floor.position_in(self.duration_seconds);
        let tail_start = f64::from(self.duration_seconds) - self.resume_tail.as_secs_f64();
        (target > 0.0 && target < tail_start).then_some(target)
    }

    /// Follow the player's reported state. Ignored until the player is ready.
    pub fn on_player_state(&mut self, player: PlayerState) {
        if matches!(
            self.state,
            SessionState::Uninitialized | SessionState::Degraded | SessionState::Closed
        ) {
            return;
        }
        self.state = match player {
            PlayerState::Unstarted => self.state,
            PlayerState::Playing => SessionState::Playing,
            PlayerState::Paused => SessionState::Paused,
            PlayerState::Ended => SessionState::Ended,
        };
    }

    /// Record the latest position and duration reported by the player.
    pub fn observe(&mut self, sample: PlaybackSample) {
        if !self.is_tracking() {
            return;
        }
        if sample.position.is_finite() && sample.position >= 0.0 {
            self.position = sample.position;
        }
        if sample.duration.is_finite() && sample.duration > 0.0 {
            self.media_duration = sample.duration;
        }
        self.on_player_state(sample.state);
    }

    /// One UI tick at monotonic instant `at`.
    ///
    /// Credits one watched second only when the player is playing and the gap
    /// since the previous tick lies inside the tick window; throttled or
    /// bunched ticks are dropped. Watched time never exceeds the lesson length.
    pub fn tick(&mut self, at: Instant, sample: PlaybackSample) {
        if !self.is_tracking() {
            return;
        }
        let gap = self
            .last_tick
            .replace(at)
            .map(|prev| at.saturating_duration_since(prev));
        self.observe(sample);

        let in_window = gap.is_some_and(|g| self.tick_window.contains(g));
        if self.state == SessionState::Playing
            && in_window
            && self.watched_seconds < self.duration_seconds
        {
            self.watched_seconds += 1;
        }
    }

    /// Displayed percent: derived from playback position, never below what
    /// was already persisted, and pinned at 100 once completed.
    #[must_use]
    pub fn percent(&self) -> ProgressPercent {
        if self.completed {
            return ProgressPercent::COMPLETE;
        }
        let duration = if self.media_duration > 0.0 {
            self.media_duration
        } else {
            f64::from(self.duration_seconds)
        };
        ProgressPercent::from_position(self.position, duration).max(self.floor)
    }

    /// The write a flush should perform, or `None` when nothing was watched
    /// since the last successful flush.
    #[must_use]
    pub fn flush_ticket(&self, at: DateTime<Utc>) -> Option<FlushTicket> {
        if !self.is_tracking() || self.watched_seconds == self.flushed_watched {
            return None;
        }
        Some(FlushTicket {
            update: ProgressUpdate::watched(self.percent(), self.completed, at),
            watched: self.watched_seconds,
        })
    }

    pub fn flush_succeeded(&mut self, ticket: &FlushTicket) {
        self.flushed_watched = self.flushed_watched.max(ticket.watched);
        self.floor = self.floor.max(ticket.update.progress_percent);
    }

    pub fn completion_succeeded(&mut self) {
        self.completed = true;
        self.floor = ProgressPercent::COMPLETE;
    }

    pub fn degrade(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Degraded;
        }
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    #[must_use]
    pub fn snapshot(&self) -> WatchProgress {
        WatchProgress {
            watched_seconds: self.watched_seconds,
            percent: self.percent(),
            state: self.state,
            completed: self.completed,
        }
    }
}
