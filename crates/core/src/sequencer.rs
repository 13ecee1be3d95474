//! Lesson lock derivation.
//!
//! Statuses are recomputed from progress on every query; nothing "unlocked" is
//! ever persisted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CourseId, Lesson, LessonId, ProgressRecord};
use crate::time::{DateKey, DayBoundary, calendar_day};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    #[error("lesson {lesson} belongs to course {found}, expected {expected}")]
    ForeignLesson {
        lesson: LessonId,
        expected: CourseId,
        found: CourseId,
    },

    #[error("duplicate lesson id {0}")]
    DuplicateLesson(LessonId),

    #[error("order_index values must be dense and zero-based; expected {expected}, got {found}")]
    NonDenseOrder { expected: u32, found: u32 },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// What a learner may do with a lesson right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Available,
    /// Predecessor finished today; opens on the next calendar day.
    DailyLocked,
    Locked,
    Completed,
}

//
// ─── COMPLETION INDEX ──────────────────────────────────────────────────────────
//

/// The completed-lesson set plus the lesson → `completed_at` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionIndex {
    completed: HashSet<LessonId>,
    completed_at: HashMap<LessonId, DateTime<Utc>>,
}

impl CompletionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every completed record; incomplete records are ignored.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ProgressRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            if record.completed() {
                index.insert(record.lesson_id(), record.completed_at());
            }
        }
        index
    }

    pub fn insert(&mut self, lesson_id: LessonId, completed_at: Option<DateTime<Utc>>) {
        self.completed.insert(lesson_id);
        if let Some(at) = completed_at {
            self.completed_at.insert(lesson_id, at);
        }
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        self.completed.contains(&lesson_id)
    }

    #[must_use]
    pub fn completed_at(&self, lesson_id: LessonId) -> Option<DateTime<Utc>> {
        self.completed_at.get(&lesson_id).copied()
    }
}

//
// ─── DERIVATION ────────────────────────────────────────────────────────────────
//

/// Derive the status of every lesson in `lessons` (already ordered by
/// `order_index`).
///
/// Rules, applied per position `i`:
/// 1. completed lessons are `Completed`;
/// 2. the first lesson is `Available`;
/// 3. a lesson whose predecessor is not completed is `Locked`;
/// 4. otherwise it is `DailyLocked` while the predecessor's completion day is
///    on or after `today`, and `Available` after that.
///
/// A completed predecessor without a `completed_at` counts as completed on an
/// earlier day.
#[must_use]
pub fn lesson_statuses(
    lessons: &[Lesson],
    completion: &CompletionIndex,
    today: DateKey,
    boundary: DayBoundary,
) -> Vec<LessonStatus> {
    let mut statuses = Vec::with_capacity(lessons.len());
    for (i, lesson) in lessons.iter().enumerate() {
        let status = if completion.is_completed(lesson.id()) {
            LessonStatus::Completed
        } else if i == 0 {
            LessonStatus::Available
        } else {
            let previous = lessons[i - 1].id();
            if !completion.is_completed(previous) {
                LessonStatus::Locked
            } else {
                match completion.completed_at(previous) {
                    Some(at) if calendar_day(at, boundary) >= today => LessonStatus::DailyLocked,
                    _ => LessonStatus::Available,
                }
            }
        };
        statuses.push(status);
    }
    statuses
}

/// Convenience over [`lesson_statuses`] taking raw progress records and "now".
#[must_use]
pub fn statuses_from_records(
    lessons: &[Lesson],
    progress: &[ProgressRecord],
    now: DateTime<Utc>,
    boundary: DayBoundary,
) -> Vec<LessonStatus> {
    let completion = CompletionIndex::from_records(progress);
    lesson_statuses(lessons, &completion, calendar_day(now, boundary), boundary)
}

//
// ─── SEQUENCE ──────────────────────────────────────────────────────────────────
//

/// The validated, ordered lessons of one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSequence {
    course_id: CourseId,
    lessons: Vec<Lesson>,
}

impl LessonSequence {
    /// Sort `lessons` by `order_index` and check they form a dense, zero-based
    /// sequence for `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `SequenceError` for foreign lessons, duplicate ids, or gaps.
    pub fn new(course_id: CourseId, mut lessons: Vec<Lesson>) -> Result<Self, SequenceError> {
        lessons.sort_by_key(|l| (l.order_index(), l.id()));

        let mut seen = HashSet::with_capacity(lessons.len());
        for (expected, lesson) in (0_u32..).zip(lessons.iter()) {
            if lesson.course_id() != course_id {
                return Err(SequenceError::ForeignLesson {
                    lesson: lesson.id(),
                    expected: course_id,
                    found: lesson.course_id(),
                });
            }
            if !seen.insert(lesson.id()) {
                return Err(SequenceError::DuplicateLesson(lesson.id()));
            }
            if lesson.order_index() != expected {
                return Err(SequenceError::NonDenseOrder {
                    expected,
                    found: lesson.order_index(),
                });
            }
        }

        Ok(Self { course_id, lessons })
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Lesson> {
        self.lessons.last()
    }

    #[must_use]
    pub fn is_last(&self, lesson_id: LessonId) -> bool {
        self.last().is_some_and(|l| l.id() == lesson_id)
    }

    /// True when the course has lessons and every one of them is completed.
    #[must_use]
    pub fn is_fully_completed(&self, completion: &CompletionIndex) -> bool {
        !self.is_empty() && self.lessons.iter().all(|l| completion.is_completed(l.id()))
    }

    #[must_use]
    pub fn outline(
        &self,
        progress: &[ProgressRecord],
        now: DateTime<Utc>,
        boundary: DayBoundary,
    ) -> CourseOutline {
        let completion = CompletionIndex::from_records(
            progress.iter().filter(|r| r.course_id() == self.course_id),
        );
        let statuses = lesson_statuses(
            &self.lessons,
            &completion,
            calendar_day(now, boundary),
            boundary,
        );
        CourseOutline {
            course_id: self.course_id,
            entries: self
                .lessons
                .iter()
                .cloned()
                .zip(statuses)
                .map(|(lesson, status)| OutlineEntry { lesson, status })
                .collect(),
        }
    }
}

//
// ─── OUTLINE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub lesson: Lesson,
    pub status: LessonStatus,
}

/// Lessons of a course paired with their derived status, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    course_id: CourseId,
    entries: Vec<OutlineEntry>,
}

impl CourseOutline {
    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<LessonStatus> {
        self.entries.iter().map(|e| e.status).collect()
    }

    /// Unknown lesson ids are `Locked`.
    #[must_use]
    pub fn status_of(&self, lesson_id: LessonId) -> LessonStatus {
        self.entries
            .iter()
            .find(|e| e.lesson.id() == lesson_id)
            .map_or(LessonStatus::Locked, |e| e.status)
    }

    /// First lesson the learner can start now.
    #[must_use]
    pub fn next_available(&self) -> Option<&Lesson> {
        self.entries
            .iter()
            .find(|e| e.status == LessonStatus::Available)
            .map(|e| &e.lesson)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == LessonStatus::Completed)
            .count()
    }

    #[must_use]
    pub fn is_course_complete(&self) -> bool {
        !self.entries.is_empty() && self.completed_count() == self.entries.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
