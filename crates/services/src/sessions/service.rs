use std::sync::Arc;
use std::time::Instant;

use lesson_core::Clock;
use lesson_core::model::{Lesson, ProgressPercent, ProgressRecord, ProgressUpdate, UserId};
use storage::repository::ProgressRepository;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::progress::{SessionState, WatchProgress};
use super::tracker::{PlaybackSample, WatchTimeTracker};
use crate::chain::{ChainResolution, CourseChainResolver};
use crate::config::EngineConfig;
use crate::error::{PlaybackError, ProgressionError};
use crate::playback::{PlaybackEvent, PlayerState, VideoPlaybackAdapter};

/// Result of one persistence attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing new was watched since the last successful flush.
    Skipped,
    Written(ProgressPercent),
    /// The store rejected the write; the next flush retries.
    Failed,
}

/// Result of marking a lesson complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// `None` when the course check failed; it is recomputed on next load.
    pub chain: Option<ChainResolution>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Tracks one lesson being watched and persists its progress.
///
/// Player failures degrade the session instead of surfacing as errors; store
/// failures during periodic flushes are logged and retried on the next flush.
pub struct LessonSession {
    user_id: UserId,
    lesson: Lesson,
    clock: Clock,
    tracker: WatchTimeTracker,
    adapter: Option<Box<dyn VideoPlaybackAdapter>>,
    progress_store: Arc<dyn ProgressRepository>,
    chain: Arc<CourseChainResolver>,
    progress_tx: watch::Sender<WatchProgress>,
    chain_tx: watch::Sender<Option<ChainResolution>>,
}

impl LessonSession {
    /// Build a session around an adapter, or around the error that prevented
    /// creating one. Without an adapter the session starts degraded.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        user_id: UserId,
        lesson: Lesson,
        saved: Option<&ProgressRecord>,
        adapter: Result<Box<dyn VideoPlaybackAdapter>, PlaybackError>,
        clock: Clock,
        config: &EngineConfig,
        progress_store: Arc<dyn ProgressRepository>,
        chain: Arc<CourseChainResolver>,
    ) -> Self {
        let mut tracker = WatchTimeTracker::new(&lesson, saved, config);
        let adapter = match adapter {
            Ok(adapter) => Some(adapter),
            Err(err) => {
                warn!(
                    lesson = %lesson.id(),
                    error = %err,
                    "player init failed; progress not tracked"
                );
                tracker.degrade();
                None
            }
        };
        let (progress_tx, _) = watch::channel(tracker.snapshot());
        let (chain_tx, _) = watch::channel(None);
        Self {
            user_id,
            lesson,
            clock,
            tracker,
            adapter,
            progress_store,
            chain,
            progress_tx,
            chain_tx,
        }
    }

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn progress(&self) -> WatchProgress {
        self.tracker.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WatchProgress> {
        self.progress_tx.subscribe()
    }

    #[must_use]
    pub fn chain_updates(&self) -> watch::Receiver<Option<ChainResolution>> {
        self.chain_tx.subscribe()
    }

    /// Load the lesson media into the player.
    pub fn start(&mut self) {
        let media = self.lesson.media().clone();
        if let Some(adapter) = self.adapter.as_mut() {
            if let Err(err) = adapter.load(&media) {
                self.degrade(&err);
                return;
            }
            debug!(lesson = %self.lesson.id(), media = media.as_str(), "media loaded");
        }
    }

    /// Apply a player event. Returns `true` when the player reported the end
    /// of the video.
    pub fn handle_event(&mut self, event: PlaybackEvent) -> bool {
        match event {
            PlaybackEvent::Ready => {
                if let Some(target) = self.tracker.on_ready() {
                    let seek = match self.adapter.as_mut() {
                        Some(adapter) => adapter.seek_to(target),
                        None => Err(PlaybackError::Unavailable("no player".into())),
                    };
                    match seek {
                        Ok(()) => {
                            debug!(lesson = %self.lesson.id(), position = target, "resumed");
                        }
                        Err(err) => self.degrade(&err),
                    }
                }
                self.publish();
                false
            }
            PlaybackEvent::StateChange(state) => {
                self.tracker.on_player_state(state);
                self.publish();
                state == PlayerState::Ended && self.tracker.state() != SessionState::Closed
            }
        }
    }

    /// One UI tick at monotonic instant `at`.
    pub fn tick(&mut self, at: Instant) -> WatchProgress {
        if self.tracker.is_tracking() {
            match self.sample() {
                Ok(sample) => self.tracker.tick(at, sample),
                Err(err) => self.degrade(&err),
            }
        }
        self.publish();
        self.tracker.snapshot()
    }

    /// Persist watch progress when something new was watched.
    ///
    /// The percent is taken from a fresh player sample. Store failures are
    /// logged and leave the session usable.
    pub async fn flush(&mut self) -> FlushOutcome {
        if self.tracker.is_tracking() {
            match self.sample() {
                Ok(sample) => self.tracker.observe(sample),
                Err(err) => self.degrade(&err),
            }
        }
        let Some(ticket) = self.tracker.flush_ticket(self.clock.now()) else {
            return FlushOutcome::Skipped;
        };
        let result = self
            .progress_store
            .upsert_progress(
                self.user_id,
                self.lesson.id(),
                self.lesson.course_id(),
                &ticket.update,
            )
            .await;
        match result {
            Ok(()) => {
                self.tracker.flush_succeeded(&ticket);
                let percent = ticket.update.progress_percent;
                debug!(
                    lesson = %self.lesson.id(),
                    percent = percent.value(),
                    watched = self.tracker.watched_seconds(),
                    "progress flushed"
                );
                self.publish();
                FlushOutcome::Written(percent)
            }
            Err(err) => {
                warn!(lesson = %self.lesson.id(), error = %err, "progress flush failed");
                FlushOutcome::Failed
            }
        }
    }

    /// Mark the lesson complete and check whether that finished its course.
    ///
    /// Pending watch time is flushed first. Calling this again is harmless:
    /// the stored completion timestamp is never replaced.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::SessionClosed` after teardown, or
    /// `ProgressionError::Storage` when the completion write fails.
    pub async fn mark_complete(&mut self) -> Result<CompletionOutcome, ProgressionError> {
        if self.tracker.state() == SessionState::Closed {
            return Err(ProgressionError::SessionClosed);
        }
        self.flush().await;

        let update = ProgressUpdate::completion(self.clock.now());
        self.progress_store
            .upsert_progress(
                self.user_id,
                self.lesson.id(),
                self.lesson.course_id(),
                &update,
            )
            .await?;
        let first = !self.tracker.is_completed();
        self.tracker.completion_succeeded();
        self.publish();
        if first {
            info!(user = %self.user_id, lesson = %self.lesson.id(), "lesson completed");
        }

        let chain = match self.chain.on_lesson_completed(self.user_id, &self.lesson).await {
            Ok(resolution) => {
                self.chain_tx.send_replace(Some(resolution.clone()));
                Some(resolution)
            }
            Err(err) => {
                warn!(
                    user = %self.user_id,
                    course = %self.lesson.course_id(),
                    error = %err,
                    "course completion check failed"
                );
                None
            }
        };
        Ok(CompletionOutcome { chain })
    }

    /// Final flush, then release the player. Later calls are no-ops.
    pub async fn teardown(&mut self) -> FlushOutcome {
        if self.tracker.state() == SessionState::Closed {
            return FlushOutcome::Skipped;
        }
        let outcome = self.flush().await;
        self.tracker.close();
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy();
        }
        self.publish();
        info!(
            lesson = %self.lesson.id(),
            watched = self.tracker.watched_seconds(),
            "lesson session closed"
        );
        outcome
    }

    fn sample(&self) -> Result<PlaybackSample, PlaybackError> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_else(|| PlaybackError::Unavailable("no player".into()))?;
        Ok(PlaybackSample {
            position: adapter.current_time()?,
            duration: adapter.duration()?,
            state: adapter.player_state()?,
        })
    }

    fn degrade(&mut self, err: &PlaybackError) {
        if self.tracker.is_tracking() {
            warn!(lesson = %self.lesson.id(), error = %err, "player failed; progress not tracked");
        }
        self.tracker.degrade();
        self.publish();
    }

    fn publish(&self) {
        self.progress_tx.send_replace(self.tracker.snapshot());
    }
}
