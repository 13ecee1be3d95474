use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{CourseId, Lesson, LessonId, ProgressRecord, UserId};
use lesson_core::sequencer::{CourseOutline, LessonSequence, LessonStatus, statuses_from_records};
use storage::repository::{LessonRepository, ProgressRepository};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::chain::{ChainResolution, CourseChainResolver};
use crate::config::EngineConfig;
use crate::error::ProgressionError;
use crate::playback::PlaybackAdapterFactory;
use crate::sessions::{LessonSession, LessonSessionHandle};

/// A course page: lesson statuses plus the course outcome when finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    pub outline: CourseOutline,
    /// Set when every lesson is completed. `None` if the check failed.
    pub completion: Option<ChainResolution>,
}

/// Entry point for course pages and lesson playback.
#[derive(Clone)]
pub struct LessonProgressService {
    clock: Clock,
    config: EngineConfig,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
    chain: Arc<CourseChainResolver>,
    players: Arc<dyn PlaybackAdapterFactory>,
}

impl LessonProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: EngineConfig,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
        chain: Arc<CourseChainResolver>,
        players: Arc<dyn PlaybackAdapterFactory>,
    ) -> Self {
        Self {
            clock,
            config,
            lessons,
            progress,
            chain,
            players,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statuses for `lessons` given the user's progress rows, as of now.
    #[must_use]
    pub fn lesson_statuses(
        &self,
        lessons: &[Lesson],
        progress: &[ProgressRecord],
    ) -> Vec<LessonStatus> {
        statuses_from_records(lessons, progress, self.clock.now(), self.config.day_boundary)
    }

    /// Load a course for `user_id`. A finished course is reconciled so a
    /// completion that failed earlier is recorded now.
    ///
    /// Returns `Ok(None)` when the course has no lessons.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError` for storage failures or malformed lesson
    /// ordering.
    pub async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, ProgressionError> {
        let lessons = self.lessons.list_lessons(course_id).await?;
        if lessons.is_empty() {
            return Ok(None);
        }
        let sequence = LessonSequence::new(course_id, lessons)?;
        let records = self.progress.list_progress(user_id, course_id).await?;
        let outline = sequence.outline(&records, self.clock.now(), self.config.day_boundary);

        let completion = if outline.is_course_complete() {
            match self.chain.reconcile(user_id, course_id).await {
                Ok(resolution) => Some(resolution),
                Err(err) => {
                    warn!(
                        user = %user_id,
                        course = %course_id,
                        error = %err,
                        "course reconcile failed"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(CourseProgress {
            outline,
            completion,
        }))
    }

    /// Open a tracked playback session for a lesson.
    ///
    /// Lock status is not enforced here; callers only open lessons whose
    /// status is openable. A player that cannot be created yields a degraded
    /// session rather than an error.
    ///
    /// Returns `Ok(None)` when the lesson does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if loading the lesson or its
    /// saved progress fails.
    pub async fn open_lesson_session(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonSessionHandle>, ProgressionError> {
        let Some(lesson) = self.lessons.get_lesson(lesson_id).await? else {
            return Ok(None);
        };
        let saved = self.progress.get_progress(user_id, lesson_id).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let adapter = self.players.create(events_tx);

        debug!(
            user = %user_id,
            lesson = %lesson_id,
            saved_percent = saved.as_ref().map(|r| r.progress_percent().value()),
            "opening lesson session"
        );
        let session = LessonSession::new(
            user_id,
            lesson,
            saved.as_ref(),
            adapter,
            self.clock,
            &self.config,
            Arc::clone(&self.progress),
            Arc::clone(&self.chain),
        );
        Ok(Some(LessonSessionHandle::spawn(
            session,
            events_rx,
            self.config.ui_tick,
            self.config.flush_interval,
        )))
    }

    /// Recompute completion of `course_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError` for storage or sequence failures.
    pub async fn reconcile_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<ChainResolution, ProgressionError> {
        self.chain.reconcile(user_id, course_id).await
    }
}
