#![forbid(unsafe_code)]

pub mod app_services;
pub mod chain;
pub mod config;
pub mod error;
pub mod playback;
pub mod progress_service;
pub mod sessions;

pub use lesson_core::Clock;

pub use app_services::ProgressionServices;
pub use chain::{ChainResolution, CourseChainResolver};
pub use config::{EngineConfig, TickWindow};
pub use error::{AppServicesError, ConfigError, PlaybackError, ProgressionError};
pub use playback::{
    PlaybackAdapterFactory, PlaybackEvent, PlayerState, ScriptedPlayer, VideoPlaybackAdapter,
};
pub use progress_service::{CourseProgress, LessonProgressService};
pub use sessions::{
    CompletionOutcome, FlushOutcome, LessonSession, LessonSessionHandle, SessionState,
    WatchProgress, WatchTimeTracker,
};
