//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::sequencer::SequenceError;
use lesson_core::time::ParseDayBoundaryError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors raised by a video player adapter.
///
/// These never escape a lesson session: they degrade it to untracked playback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("player unavailable: {0}")]
    Unavailable(String),
    #[error("player `{op}` call failed: {reason}")]
    Control { op: &'static str, reason: String },
}

impl PlaybackError {
    pub(crate) fn control(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Control {
            op,
            reason: reason.into(),
        }
    }
}

/// Errors emitted by progression services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("lesson session is closed")]
    SessionClosed,
}

/// Errors reading `EngineConfig` from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got `{raw}`")]
    InvalidNumber { key: &'static str, raw: String },
    #[error(transparent)]
    DayBoundary(#[from] ParseDayBoundaryError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
