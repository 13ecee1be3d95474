use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress percent must be in 0..=100, got {0}")]
    PercentOutOfRange(u32),

    #[error("completed lesson must be pinned at 100%, got {0}%")]
    CompletedBelowFull(u8),
}

//
// ─── PERCENT ───────────────────────────────────────────────────────────────────
//

/// Estimated fraction of a lesson's video watched, in whole percent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ProgressPercent(u8);

impl ProgressPercent {
    pub const ZERO: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// # Errors
    ///
    /// Returns `ProgressError::PercentOutOfRange` above 100.
    pub fn new(value: u32) -> Result<Self, ProgressError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ProgressError::PercentOutOfRange(value))
    }

    /// `min(100, round(position / duration × 100))`.
    ///
    /// Non-finite or non-positive durations yield zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_position(position_secs: f64, duration_secs: f64) -> Self {
        if !duration_secs.is_finite() || duration_secs <= 0.0 || !position_secs.is_finite() {
            return Self::ZERO;
        }
        let pct = (position_secs / duration_secs * 100.0).round();
        Self(pct.clamp(0.0, 100.0) as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        self.0 >= 100
    }

    /// Estimated playback position for this percent of a `duration_secs` video.
    #[must_use]
    pub fn position_in(self, duration_secs: u32) -> f64 {
        f64::from(self.0) / 100.0 * f64::from(duration_secs)
    }
}

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// Payload of a progress upsert keyed by (user, lesson).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed: bool,
    pub progress_percent: ProgressPercent,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_watched_at: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Periodic watch-time write. `completed` mirrors the session's own flag so a
    /// flush never clears a completion.
    #[must_use]
    pub fn watched(percent: ProgressPercent, completed: bool, at: DateTime<Utc>) -> Self {
        Self {
            completed,
            progress_percent: if completed {
                ProgressPercent::COMPLETE
            } else {
                percent
            },
            completed_at: None,
            last_watched_at: at,
        }
    }

    #[must_use]
    pub fn completion(at: DateTime<Utc>) -> Self {
        Self {
            completed: true,
            progress_percent: ProgressPercent::COMPLETE,
            completed_at: Some(at),
            last_watched_at: at,
        }
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// One learner's progress on one lesson.
///
/// Invariants held by every constructor and mutator:
/// - `progress_percent` never decreases;
/// - once `completed`, the record stays completed at 100%;
/// - `completed_at`, once set, is never replaced or cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    user_id: UserId,
    lesson_id: LessonId,
    course_id: CourseId,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    progress_percent: ProgressPercent,
    last_watched_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Build the row inserted by the first upsert for (user, lesson).
    #[must_use]
    pub fn from_update(
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        update: &ProgressUpdate,
    ) -> Self {
        let mut record = Self {
            user_id,
            lesson_id,
            course_id,
            completed: false,
            completed_at: None,
            progress_percent: ProgressPercent::ZERO,
            last_watched_at: update.last_watched_at,
        };
        record.apply_update(update);
        record
    }

    /// Rehydrate a record from storage.
    ///
    /// Legacy rows may be completed without a `completed_at`; that is accepted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CompletedBelowFull` if a completed row is not at 100%.
    pub fn from_persisted(
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
        progress_percent: ProgressPercent,
        last_watched_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if completed && !progress_percent.is_complete() {
            return Err(ProgressError::CompletedBelowFull(progress_percent.value()));
        }
        Ok(Self {
            user_id,
            lesson_id,
            course_id,
            completed,
            completed_at,
            progress_percent,
            last_watched_at,
        })
    }

    /// Merge an upsert payload into this record, preserving the invariants.
    pub fn apply_update(&mut self, update: &ProgressUpdate) {
        if update.completed {
            self.mark_completed(update.completed_at.unwrap_or(update.last_watched_at));
            self.last_watched_at = self.last_watched_at.max(update.last_watched_at);
        } else {
            self.apply_watch(update.progress_percent, update.last_watched_at);
        }
    }

    pub fn apply_watch(&mut self, percent: ProgressPercent, at: DateTime<Utc>) {
        if !self.completed {
            self.progress_percent = self.progress_percent.max(percent);
        }
        self.last_watched_at = self.last_watched_at.max(at);
    }

    /// Returns `true` if this call moved the record into the completed state.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> bool {
        let newly = !self.completed;
        self.completed = true;
        self.progress_percent = ProgressPercent::COMPLETE;
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
        self.last_watched_at = self.last_watched_at.max(at);
        newly
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn progress_percent(&self) -> ProgressPercent {
        self.progress_percent
    }

    #[must_use]
    pub fn last_watched_at(&self) -> DateTime<Utc> {
        self.last_watched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn pct(v: u32) -> ProgressPercent {
        ProgressPercent::new(v).unwrap()
    }

    fn fresh() -> ProgressRecord {
        ProgressRecord::from_update(
            UserId::new(1),
            LessonId::new(10),
            CourseId::new(100),
            &ProgressUpdate::watched(pct(20), false, fixed_now()),
        )
    }

    #[test]
    fn percent_from_position_rounds_and_clamps() {
        assert_eq!(ProgressPercent::from_position(45.0, 300.0), pct(15));
        assert_eq!(ProgressPercent::from_position(299.0, 300.0), pct(100));
        assert_eq!(ProgressPercent::from_position(400.0, 300.0), pct(100));
        assert_eq!(ProgressPercent::from_position(10.0, 0.0), ProgressPercent::ZERO);
        assert_eq!(ProgressPercent::from_position(f64::NAN, 300.0), ProgressPercent::ZERO);
        assert!(ProgressPercent::new(101).is_err());
    }

    #[test]
    fn watch_updates_never_decrease_percent() {
        let mut record = fresh();
        record.apply_watch(pct(10), fixed_now() + Duration::seconds(10));
        assert_eq!(record.progress_percent(), pct(20));
        record.apply_watch(pct(35), fixed_now() + Duration::seconds(20));
        assert_eq!(record.progress_percent(), pct(35));
    }

    #[test]
    fn completion_is_sticky() {
        let mut record = fresh();
        let first = fixed_now() + Duration::minutes(5);
        assert!(record.mark_completed(first));
        assert!(!record.mark_completed(first + Duration::days(1)));
        assert_eq!(record.completed_at(), Some(first));

        record.apply_update(&ProgressUpdate::watched(pct(40), false, first + Duration::days(2)));
        assert!(record.completed());
        assert_eq!(record.progress_percent(), ProgressPercent::COMPLETE);
        assert_eq!(record.completed_at(), Some(first));
    }

    #[test]
    fn last_watched_never_moves_back() {
        let mut record = fresh();
        let later = fixed_now() + Duration::hours(1);
        record.apply_watch(pct(30), later);
        record.apply_watch(pct(30), fixed_now());
        assert_eq!(record.last_watched_at(), later);

        record.apply_update(&ProgressUpdate::completion(fixed_now()));
        assert_eq!(record.last_watched_at(), later);
    }

    #[test]
    fn persisted_completed_row_must_be_full() {
        let err = ProgressRecord::from_persisted(
            UserId::new(1),
            LessonId::new(1),
            CourseId::new(1),
            true,
            None,
            pct(80),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::CompletedBelowFull(80));
    }
}
