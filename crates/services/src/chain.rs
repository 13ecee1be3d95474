use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{CourseChainEntry, CourseId, EnrollmentUpdate, Lesson, UserId, next_course};
use lesson_core::sequencer::{CompletionIndex, LessonSequence};
use serde::Serialize;
use storage::repository::{
    CourseChainRepository, EnrollmentRepository, LessonRepository, ProgressRepository,
};
use tracing::{debug, info};

use crate::error::ProgressionError;

/// What completing a lesson meant for its course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainResolution {
    /// Some lessons of the course are still open.
    InProgress { course_id: CourseId },
    /// Every lesson is done but the user holds no enrollment to complete.
    NotEnrolled { course_id: CourseId },
    CourseCompleted {
        course_id: CourseId,
        /// `false` when the enrollment was already marked complete.
        newly_completed: bool,
        /// The course to continue with, `None` at the end of the package or
        /// when the course is in no package.
        next_course: Option<CourseChainEntry>,
    },
}

impl ChainResolution {
    #[must_use]
    pub fn next_course(&self) -> Option<&CourseChainEntry> {
        match self {
            Self::CourseCompleted { next_course, .. } => next_course.as_ref(),
            _ => None,
        }
    }
}

/// Completes enrollments and resolves the next course of a package.
///
/// Completion is derived from stored lesson progress, so a failed attempt is
/// simply recomputed by the next [`CourseChainResolver::reconcile`].
#[derive(Clone)]
pub struct CourseChainResolver {
    clock: Clock,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    chain: Arc<dyn CourseChainRepository>,
}

impl CourseChainResolver {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        chain: Arc<dyn CourseChainRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            progress,
            enrollments,
            chain,
        }
    }

    /// Called after `lesson` was persisted as completed.
    ///
    /// Only the last lesson of a course can finish it; any other lesson
    /// resolves to `InProgress` without touching the enrollment.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError` for storage or sequence failures.
    pub async fn on_lesson_completed(
        &self,
        user_id: UserId,
        lesson: &Lesson,
    ) -> Result<ChainResolution, ProgressionError> {
        let course_id = lesson.course_id();
        let sequence = self.sequence(course_id).await?;
        if !sequence.is_last(lesson.id()) {
            debug!(
                user = %user_id,
                lesson = %lesson.id(),
                "completed lesson is not last in course"
            );
            return Ok(ChainResolution::InProgress { course_id });
        }
        self.resolve(user_id, &sequence).await
    }

    /// Recompute course completion from stored progress and complete the
    /// enrollment if needed. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError` for storage or sequence failures.
    pub async fn reconcile(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<ChainResolution, ProgressionError> {
        let sequence = self.sequence(course_id).await?;
        self.resolve(user_id, &sequence).await
    }

    async fn sequence(&self, course_id: CourseId) -> Result<LessonSequence, ProgressionError> {
        let lessons = self.lessons.list_lessons(course_id).await?;
        Ok(LessonSequence::new(course_id, lessons)?)
    }

    async fn resolve(
        &self,
        user_id: UserId,
        sequence: &LessonSequence,
    ) -> Result<ChainResolution, ProgressionError> {
        let course_id = sequence.course_id();
        let records = self.progress.list_progress(user_id, course_id).await?;
        let completion = CompletionIndex::from_records(&records);
        if !sequence.is_fully_completed(&completion) {
            return Ok(ChainResolution::InProgress { course_id });
        }

        let Some(enrollment) = self.enrollments.get_enrollment(user_id, course_id).await? else {
            debug!(user = %user_id, course = %course_id, "course finished without enrollment");
            return Ok(ChainResolution::NotEnrolled { course_id });
        };

        let newly_completed = !enrollment.completed();
        if newly_completed {
            self.enrollments
                .update_enrollment(
                    user_id,
                    course_id,
                    EnrollmentUpdate::completed_at(self.clock.now()),
                )
                .await?;
            info!(user = %user_id, course = %course_id, "course completed");
        }

        let next_course = self.next_course(course_id).await?;
        if let Some(next) = &next_course {
            debug!(course = %course_id, next = %next.course_id, "next course in package");
        }
        Ok(ChainResolution::CourseCompleted {
            course_id,
            newly_completed,
            next_course,
        })
    }

    async fn next_course(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CourseChainEntry>, ProgressionError> {
        let Some(current) = self.chain.chain_entry_for_course(course_id).await? else {
            return Ok(None);
        };
        let entries = self.chain.list_course_chain(current.package_id).await?;
        Ok(next_course(&entries, &current).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{Enrollment, LessonId, MediaRef, PackageId, ProgressUpdate};
    use lesson_core::time::{fixed_clock, fixed_now};
    use storage::repository::Storage;

    fn lesson(id: u64, course: u64, order: u32) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            CourseId::new(course),
            format!("Lesson {id}"),
            order,
            60,
            MediaRef::new(format!("m{id}")).unwrap(),
        )
        .unwrap()
    }

    fn resolver(storage: &Storage) -> CourseChainResolver {
        CourseChainResolver::new(
            fixed_clock(),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.course_chain),
        )
    }

    async fn seed(storage: &Storage, user: UserId) -> Vec<Lesson> {
        let lessons = vec![lesson(1, 10, 0), lesson(2, 10, 1)];
        for l in &lessons {
            storage.lessons.upsert_lesson(l).await.unwrap();
        }
        for (course, order) in [(10, 0), (11, 1)] {
            storage
                .course_chain
                .upsert_chain_entry(&CourseChainEntry {
                    course_id: CourseId::new(course),
                    package_id: PackageId::new(7),
                    order_index: order,
                })
                .await
                .unwrap();
        }
        storage
            .enrollments
            .insert_enrollment(&Enrollment::new(user, CourseId::new(10)))
            .await
            .unwrap();
        lessons
    }

    async fn complete(storage: &Storage, user: UserId, lesson: &Lesson) {
        storage
            .progress
            .upsert_progress(
                user,
                lesson.id(),
                lesson.course_id(),
                &ProgressUpdate::completion(fixed_now()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_last_lesson_leaves_enrollment_alone() {
        let storage = Storage::in_memory();
        let user = UserId::new(1);
        let lessons = seed(&storage, user).await;
        complete(&storage, user, &lessons[0]).await;

        let outcome = resolver(&storage)
            .on_lesson_completed(user, &lessons[0])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ChainResolution::InProgress {
                course_id: CourseId::new(10)
            }
        );
        let enrollment = storage
            .enrollments
            .get_enrollment(user, CourseId::new(10))
            .await
            .unwrap()
            .unwrap();
        assert!(!enrollment.completed());
    }

    #[tokio::test]
    async fn last_lesson_completes_course_once() {
        let storage = Storage::in_memory();
        let user = UserId::new(1);
        let lessons = seed(&storage, user).await;
        for l in &lessons {
            complete(&storage, user, l).await;
        }
        let resolver = resolver(&storage);

        let first = resolver.on_lesson_completed(user, &lessons[1]).await.unwrap();
        let ChainResolution::CourseCompleted { newly_completed, next_course, .. } = first else {
            panic!("expected completion, got {first:?}");
        };
        assert!(newly_completed);
        assert_eq!(next_course.map(|e| e.course_id), Some(CourseId::new(11)));

        let again = resolver.reconcile(user, CourseId::new(10)).await.unwrap();
        assert!(matches!(
            again,
            ChainResolution::CourseCompleted { newly_completed: false, .. }
        ));
        let enrollment = storage
            .enrollments
            .get_enrollment(user, CourseId::new(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.completion_date(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn missing_enrollment_is_reported() {
        let storage = Storage::in_memory();
        let user = UserId::new(1);
        let lessons = seed(&storage, user).await;
        let stranger = UserId::new(2);
        for l in &lessons {
            complete(&storage, stranger, l).await;
        }

        let outcome = resolver(&storage).reconcile(stranger, CourseId::new(10)).await.unwrap();
        assert_eq!(
            outcome,
            ChainResolution::NotEnrolled {
                course_id: CourseId::new(10)
            }
        );
    }
}
