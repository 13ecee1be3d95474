use lesson_core::model::{
    CourseChainEntry, CourseId, Enrollment, Lesson, LessonId, MediaRef, PackageId,
    ProgressPercent, ProgressRecord, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let media = MediaRef::new(row.try_get::<String, _>("media_ref").map_err(ser)?).map_err(ser)?;
    Lesson::new(
        LessonId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        u32_from_i64("order_index", row.try_get("order_index").map_err(ser)?)?,
        u32_from_i64("duration_seconds", row.try_get("duration_seconds").map_err(ser)?)?,
        media,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let percent = ProgressPercent::new(u32_from_i64(
        "progress_percent",
        row.try_get("progress_percent").map_err(ser)?,
    )?)
    .map_err(ser)?;

    ProgressRecord::from_persisted(
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        LessonId::new(i64_to_u64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        bool_from_i64("completed", row.try_get("completed").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
        percent,
        row.try_get("last_watched_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment::from_persisted(
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        bool_from_i64("completed", row.try_get("completed").map_err(ser)?)?,
        row.try_get("completion_date").map_err(ser)?,
    ))
}

pub(crate) fn map_chain_row(row: &SqliteRow) -> Result<CourseChainEntry, StorageError> {
    Ok(CourseChainEntry {
        course_id: CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        package_id: PackageId::new(i64_to_u64(
            "package_id",
            row.try_get("package_id").map_err(ser)?,
        )?),
        order_index: u32_from_i64("order_index", row.try_get("order_index").map_err(ser)?)?,
    })
}
