use lesson_core::model::{CourseId, LessonId, ProgressRecord, ProgressUpdate, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn list_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, lesson_id, course_id, completed, completed_at,
                    progress_percent, last_watched_at
                FROM lesson_progress
                WHERE user_id = ?1 AND course_id = ?2
                ORDER BY lesson_id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, lesson_id, course_id, completed, completed_at,
                    progress_percent, last_watched_at
                FROM lesson_progress
                WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        update: &ProgressUpdate,
    ) -> Result<(), StorageError> {
        // Row as it would be inserted fresh; the conflict clause merges it with
        // the same rules as `ProgressRecord::apply_update`.
        let fresh = ProgressRecord::from_update(user_id, lesson_id, course_id, update);

        sqlx::query(
            r"
                INSERT INTO lesson_progress (
                    user_id, lesson_id, course_id, completed, completed_at,
                    progress_percent, last_watched_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                    completed = MAX(lesson_progress.completed, excluded.completed),
                    completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at),
                    progress_percent = CASE
                        WHEN MAX(lesson_progress.completed, excluded.completed) = 1 THEN 100
                        ELSE MAX(lesson_progress.progress_percent, excluded.progress_percent)
                    END,
                    last_watched_at = MAX(lesson_progress.last_watched_at, excluded.last_watched_at)
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .bind(i64::from(fresh.completed()))
        .bind(fresh.completed_at())
        .bind(i64::from(fresh.progress_percent().value()))
        .bind(fresh.last_watched_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
