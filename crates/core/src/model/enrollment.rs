use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, UserId};

/// A learner's access grant to a course, tracking overall course completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    user_id: UserId,
    course_id: CourseId,
    completed: bool,
    completion_date: Option<DateTime<Utc>>,
}

/// Payload of `updateEnrollment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentUpdate {
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
}

impl EnrollmentUpdate {
    #[must_use]
    pub fn completed_at(at: DateTime<Utc>) -> Self {
        Self {
            completed: true,
            completion_date: Some(at),
        }
    }
}

impl Enrollment {
    /// A fresh, not yet completed enrollment.
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            completed: false,
            completion_date: None,
        }
    }

    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        completed: bool,
        completion_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            course_id,
            completed,
            completion_date,
        }
    }

    /// Course completion is sticky: a completed enrollment keeps its first
    /// `completion_date`.
    pub fn apply_update(&mut self, update: EnrollmentUpdate) {
        if self.completed {
            return;
        }
        self.completed = update.completed;
        if update.completed {
            self.completion_date = update.completion_date.or(self.completion_date);
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
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
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }
}
