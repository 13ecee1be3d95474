use lesson_core::model::{CourseChainEntry, CourseId, PackageId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_chain_row};
use crate::repository::{CourseChainRepository, StorageError};

#[async_trait::async_trait]
impl CourseChainRepository for SqliteRepository {
    async fn upsert_chain_entry(&self, entry: &CourseChainEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO course_chain (course_id, package_id, order_index)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(course_id) DO UPDATE SET
                    package_id = excluded.package_id,
                    order_index = excluded.order_index
            ",
        )
        .bind(id_i64("course_id", entry.course_id.value())?)
        .bind(id_i64("package_id", entry.package_id.value())?)
        .bind(i64::from(entry.order_index))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(())
    }

    async fn list_course_chain(
        &self,
        package_id: PackageId,
    ) -> Result<Vec<CourseChainEntry>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT course_id, package_id, order_index
                FROM course_chain
                WHERE package_id = ?1
                ORDER BY order_index ASC
            ",
        )
        .bind(id_i64("package_id", package_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_chain_row(&row)?);
        }
        Ok(out)
    }

    async fn chain_entry_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CourseChainEntry>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT course_id, package_id, order_index
                FROM course_chain
                WHERE course_id = ?1
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_chain_row).transpose()
    }
}
