use lesson_core::model::{CourseId, Lesson, LessonId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_lesson_row};
use crate::repository::{LessonRepository, StorageError};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, course_id, title, order_index, duration_seconds, media_ref)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                order_index = excluded.order_index,
                duration_seconds = excluded.duration_seconds,
                media_ref = excluded.media_ref
            ",
        )
        .bind(id_i64("lesson_id", lesson.id().value())?)
        .bind(id_i64("course_id", lesson.course_id().value())?)
        .bind(lesson.title())
        .bind(i64::from(lesson.order_index()))
        .bind(i64::from(lesson.duration_seconds()))
        .bind(lesson.media().as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, course_id, title, order_index, duration_seconds, media_ref
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, order_index, duration_seconds, media_ref
            FROM lessons
            WHERE course_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }
}
