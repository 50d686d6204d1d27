use chrono::{DateTime, Utc};
use lms_core::model::{
    ContentKind, ContentRef, Course, CourseId, Enrollment, EnrollmentId, EnrollmentStatus,
    LearningPath, LearningPathStep, Module, ModuleId, PathId, PathProgress, PathProgressId,
    PathProgressStatus, PathStatus, StepId, StepProgress, StepProgressId, StepProgressStatus,
    TenantId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, surfacing constraint violations as `Conflict`.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation()
            || db_err.is_foreign_key_violation()
            || db_err.is_check_violation()
        {
            return StorageError::Conflict(db_err.message().to_owned());
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u64(row: &SqliteRow, column: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

fn get_u32(row: &SqliteRow, column: &'static str) -> Result<u32, StorageError> {
    i64_to_u32(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

fn get_ts(row: &SqliteRow, column: &'static str) -> Result<Option<DateTime<Utc>>, StorageError> {
    row.try_get(column).map_err(ser)
}

//
// ─── STATUSES ──────────────────────────────────────────────────────────────────
//

pub(crate) fn parse_path_progress_status(s: &str) -> Result<PathProgressStatus, StorageError> {
    match s {
        "NOT_STARTED" => Ok(PathProgressStatus::NotStarted),
        "IN_PROGRESS" => Ok(PathProgressStatus::InProgress),
        "COMPLETED" => Ok(PathProgressStatus::Completed),
        "PAUSED" => Ok(PathProgressStatus::Paused),
        _ => Err(StorageError::Serialization(format!(
            "invalid path progress status: {s}"
        ))),
    }
}

pub(crate) fn parse_step_progress_status(s: &str) -> Result<StepProgressStatus, StorageError> {
    match s {
        "NOT_STARTED" => Ok(StepProgressStatus::NotStarted),
        "IN_PROGRESS" => Ok(StepProgressStatus::InProgress),
        "COMPLETED" => Ok(StepProgressStatus::Completed),
        "SKIPPED" => Ok(StepProgressStatus::Skipped),
        _ => Err(StorageError::Serialization(format!(
            "invalid step progress status: {s}"
        ))),
    }
}

//
// ─── ROW MAPPERS ───────────────────────────────────────────────────────────────
//

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Ok(Course {
        id: CourseId::new(get_u64(row, "id")?),
        tenant_id: TenantId::new(get_u64(row, "tenant_id")?),
        title: row.try_get("title").map_err(ser)?,
    })
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    Ok(Module {
        id: ModuleId::new(get_u64(row, "id")?),
        course_id: CourseId::new(get_u64(row, "course_id")?),
        title: row.try_get("title").map_err(ser)?,
    })
}

pub(crate) fn map_path_row(row: &SqliteRow) -> Result<LearningPath, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(LearningPath {
        id: PathId::new(get_u64(row, "id")?),
        tenant_id: TenantId::new(get_u64(row, "tenant_id")?),
        title: row.try_get("title").map_err(ser)?,
        slug: row.try_get("slug").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        status: status.parse::<PathStatus>().map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_step_row(row: &SqliteRow) -> Result<LearningPathStep, StorageError> {
    let kind: String = row.try_get("content_kind").map_err(ser)?;
    let kind = ContentKind::parse(&kind).map_err(ser)?;
    Ok(LearningPathStep {
        id: StepId::new(get_u64(row, "id")?),
        path_id: PathId::new(get_u64(row, "path_id")?),
        order: get_u32(row, "step_order")?,
        content: ContentRef::from_parts(kind, get_u64(row, "object_id")?),
        is_required: row.try_get("is_required").map_err(ser)?,
    })
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Enrollment {
        id: EnrollmentId::new(get_u64(row, "id")?),
        user_id: UserId::new(get_u64(row, "user_id")?),
        course_id: CourseId::new(get_u64(row, "course_id")?),
        status: status.parse::<EnrollmentStatus>().map_err(ser)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
        completed_at: get_ts(row, "completed_at")?,
    })
}

pub(crate) fn map_path_progress_row(row: &SqliteRow) -> Result<PathProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(PathProgress {
        id: PathProgressId::new(get_u64(row, "id")?),
        user_id: UserId::new(get_u64(row, "user_id")?),
        path_id: PathId::new(get_u64(row, "path_id")?),
        status: parse_path_progress_status(&status)?,
        started_at: get_ts(row, "started_at")?,
        completed_at: get_ts(row, "completed_at")?,
        current_step_order: get_u32(row, "current_step_order")?,
    })
}

pub(crate) fn map_step_progress_row(row: &SqliteRow) -> Result<StepProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(StepProgress {
        id: StepProgressId::new(get_u64(row, "id")?),
        user_id: UserId::new(get_u64(row, "user_id")?),
        path_progress_id: PathProgressId::new(get_u64(row, "path_progress_id")?),
        step_id: StepId::new(get_u64(row, "step_id")?),
        status: parse_step_progress_status(&status)?,
        started_at: get_ts(row, "started_at")?,
        completed_at: get_ts(row, "completed_at")?,
    })
}

/// Convert every row, stopping at the first malformed one.
pub(crate) fn map_rows<T>(
    rows: &[SqliteRow],
    map: fn(&SqliteRow) -> Result<T, StorageError>,
) -> Result<Vec<T>, StorageError> {
    rows.iter().map(map).collect()
}
