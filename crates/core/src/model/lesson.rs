use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson media reference cannot be empty")]
    EmptyMedia,

    #[error("lesson duration must be > 0 seconds")]
    ZeroDuration,
}

/// Opaque reference to the video a lesson plays (e.g. a hosted video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef(String);

impl MediaRef {
    /// # Errors
    ///
    /// Returns `LessonError::EmptyMedia` for blank references.
    pub fn new(value: impl Into<String>) -> Result<Self, LessonError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LessonError::EmptyMedia);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Smallest unit of course content, strictly ordered within its course.
///
/// Lessons are authored elsewhere; the engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    order_index: u32,
    duration_seconds: u32,
    media: MediaRef,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank or the duration is zero.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        order_index: u32,
        duration_seconds: u32,
        media: MediaRef,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if duration_seconds == 0 {
            return Err(LessonError::ZeroDuration);
        }
        Ok(Self {
            id,
            course_id,
            title,
            order_index,
            duration_seconds,
            media,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Zero-based position inside the course.
    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn media(&self) -> &MediaRef {
        &self.media
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_title_and_zero_duration() {
        let media = MediaRef::new("abc123").unwrap();
        let blank = Lesson::new(LessonId::new(1), CourseId::new(1), "  ", 0, 60, media.clone());
        assert_eq!(blank.unwrap_err(), LessonError::EmptyTitle);

        let zero = Lesson::new(LessonId::new(1), CourseId::new(1), "Intro", 0, 0, media);
        assert_eq!(zero.unwrap_err(), LessonError::ZeroDuration);
    }

    #[test]
    fn media_ref_is_trimmed() {
        assert_eq!(MediaRef::new("  vid-9 ").unwrap().as_str(), "vid-9");
        assert_eq!(MediaRef::new("").unwrap_err(), LessonError::EmptyMedia);
    }
}
