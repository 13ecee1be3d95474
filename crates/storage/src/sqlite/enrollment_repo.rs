use lesson_core::model::{CourseId, Enrollment, EnrollmentUpdate, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO enrollments (user_id, course_id, completed, completion_date)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, course_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", enrollment.user_id().value())?)
        .bind(id_i64("course_id", enrollment.course_id().value())?)
        .bind(i64::from(enrollment.completed()))
        .bind(enrollment.completion_date())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, course_id, completed, completion_date
                FROM enrollments
                WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn update_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
        update: EnrollmentUpdate,
    ) -> Result<(), StorageError> {
        // A completed enrollment keeps its first completion date.
        let res = sqlx::query(
            r"
                UPDATE enrollments SET
                    completion_date = CASE
                        WHEN completed = 1 THEN completion_date
                        WHEN ?3 = 1 THEN COALESCE(?4, completion_date)
                        ELSE completion_date
                    END,
                    completed = MAX(completed, ?3)
                WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .bind(i64::from(update.completed))
        .bind(update.completion_date)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
