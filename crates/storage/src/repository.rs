use async_trait::async_trait;
use lesson_core::model::{
    CourseChainEntry, CourseId, Enrollment, EnrollmentUpdate, Lesson, LessonId, PackageId,
    ProgressRecord, ProgressUpdate, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to authored lessons (plus an upsert for seeding and tests).
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch a lesson by ID; `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// All lessons of a course ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;
}

/// Per-user, per-lesson progress rows. One row per (user, lesson).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Progress rows of `user_id` for every lesson of `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert the (user, lesson) row or merge `update` into it.
    ///
    /// Implementations must keep the record invariants: percent never drops,
    /// completion is never cleared, `completed_at` is never replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        update: &ProgressUpdate,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Grant access to a course. Existing enrollments are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user is not enrolled, or other
    /// storage errors.
    async fn update_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        update: EnrollmentUpdate,
    ) -> Result<(), StorageError>;
}

/// Ordering of courses within packages. A course belongs to at most one package.
#[async_trait]
pub trait CourseChainRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_chain_entry(&self, entry: &CourseChainEntry) -> Result<(), StorageError>;

    /// Entries of a package ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_course_chain(
        &self,
        package_id: PackageId,
    ) -> Result<Vec<CourseChainEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn chain_entry_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CourseChainEntry>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    progress: Arc<Mutex<HashMap<(UserId, LessonId), ProgressRecord>>>,
    enrollments: Arc<Mutex<HashMap<(UserId, CourseId), Enrollment>>>,
    chain: Arc<Mutex<HashMap<CourseId, CourseChainEntry>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        guard.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        let mut lessons: Vec<_> = guard
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order_index(), l.id()));
        Ok(lessons)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.user_id() == user_id && r.course_id() == course_id)
            .cloned()
            .collect();
        records.sort_by_key(ProgressRecord::lesson_id);
        Ok(records)
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, lesson_id)).cloned())
    }

    async fn upsert_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        update: &ProgressUpdate,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard
            .entry((user_id, lesson_id))
            .and_modify(|record| record.apply_update(update))
            .or_insert_with(|| ProgressRecord::from_update(user_id, lesson_id, course_id, update));
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        guard
            .entry((enrollment.user_id(), enrollment.course_id()))
            .or_insert_with(|| enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, course_id)).cloned())
    }

    async fn update_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        update: EnrollmentUpdate,
    ) -> Result<(), StorageError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        let enrollment = guard
            .get_mut(&(user_id, course_id))
            .ok_or(StorageError::NotFound)?;
        enrollment.apply_update(update);
        Ok(())
    }
}

#[async_trait]
impl CourseChainRepository for InMemoryRepository {
    async fn upsert_chain_entry(&self, entry: &CourseChainEntry) -> Result<(), StorageError> {
        let mut guard = self.chain.lock().map_err(poisoned)?;
        let clash = guard.values().any(|e| {
            e.course_id != entry.course_id
                && e.package_id == entry.package_id
                && e.order_index == entry.order_index
        });
        if clash {
            return Err(StorageError::Conflict);
        }
        guard.insert(entry.course_id, *entry);
        Ok(())
    }

    async fn list_course_chain(
        &self,
        package_id: PackageId,
    ) -> Result<Vec<CourseChainEntry>, StorageError> {
        let guard = self.chain.lock().map_err(poisoned)?;
        let mut entries: Vec<_> = guard
            .values()
            .filter(|e| e.package_id == package_id)
            .copied()
            .collect();
        entries.sort_by_key(|e| e.order_index);
        Ok(entries)
    }

    async fn chain_entry_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CourseChainEntry>, StorageError> {
        let guard = self.chain.lock().map_err(poisoned)?;
        Ok(guard.get(&course_id).copied())
    }
}

/// Aggregates the progress-store repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub course_chain: Arc<dyn CourseChainRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every role.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: LessonRepository
            + ProgressRepository
            + EnrollmentRepository
            + CourseChainRepository
            + Clone
            + 'static,
    {
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(repo.clone());
        let course_chain: Arc<dyn CourseChainRepository> = Arc::new(repo);
        Self {
            lessons,
            progress,
            enrollments,
            course_chain,
        }
    }
}
