use lesson_core::model::ProgressPercent;
use serde::Serialize;

/// Lifecycle of one lesson's video session.
///
/// `Uninitialized → Ready → Playing ⇄ Paused → Ended`, with `Degraded` when
/// the player fails and `Closed` after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Playing,
    Paused,
    Ended,
    /// Player failed; the video may still be watched but nothing is tracked.
    Degraded,
    Closed,
}

/// Read-only view of a session, published for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchProgress {
    pub watched_seconds: u32,
    pub percent: ProgressPercent,
    pub state: SessionState,
    pub completed: bool,
}
