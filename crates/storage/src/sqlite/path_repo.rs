use lms_core::model::{
    CourseId, LearningPath, LearningPathStep, NewPath, NewStep, PathId, PathStatus, StepId,
    TenantId,
};

use super::SqliteTx;
use super::mapping::{db, id_to_i64, map_path_row, map_rows, map_step_row};
use crate::repository::{PathQueries, StorageError};

const PATH_COLUMNS: &str = "id, tenant_id, title, slug, description, status, created_at";
const STEP_COLUMNS: &str = "id, path_id, step_order, content_kind, object_id, is_required";

fn not_found_if_untouched(rows_affected: u64) -> Result<(), StorageError> {
    if rows_affected == 0 {
        Err(StorageError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl PathQueries for SqliteTx {
    async fn insert_path(&mut self, path: NewPath) -> Result<LearningPath, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO learning_paths (tenant_id, title, slug, description, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("tenant_id", path.tenant_id.value())?)
        .bind(&path.title)
        .bind(&path.slug)
        .bind(&path.description)
        .bind(path.status.as_str())
        .bind(path.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("path_id sign overflow".into()))?;
        Ok(path.into_path(PathId::new(id)))
    }

    async fn get_path(&mut self, id: PathId) -> Result<Option<LearningPath>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PATH_COLUMNS} FROM learning_paths WHERE id = ?1"
        ))
        .bind(id_to_i64("path_id", id.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_path_row).transpose()
    }

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM learning_paths WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(row.is_some())
    }

    async fn list_paths(&mut self, tenant: TenantId) -> Result<Vec<LearningPath>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATH_COLUMNS} FROM learning_paths WHERE tenant_id = ?1 ORDER BY title, id"
        ))
        .bind(id_to_i64("tenant_id", tenant.value())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_path_row)
    }

    async fn set_path_status(
        &mut self,
        id: PathId,
        status: PathStatus,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE learning_paths SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id_to_i64("path_id", id.value())?)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        not_found_if_untouched(res.rows_affected())
    }

    async fn delete_path(&mut self, id: PathId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM learning_paths WHERE id = ?1")
            .bind(id_to_i64("path_id", id.value())?)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        not_found_if_untouched(res.rows_affected())
    }

    async fn steps_for_path(
        &mut self,
        path: PathId,
    ) -> Result<Vec<LearningPathStep>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM learning_path_steps WHERE path_id = ?1 ORDER BY step_order"
        ))
        .bind(id_to_i64("path_id", path.value())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_step_row)
    }

    async fn get_step(&mut self, id: StepId) -> Result<Option<LearningPathStep>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM learning_path_steps WHERE id = ?1"
        ))
        .bind(id_to_i64("step_id", id.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_step_row).transpose()
    }

    async fn insert_step(&mut self, step: NewStep) -> Result<LearningPathStep, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO learning_path_steps (path_id, step_order, content_kind, object_id, is_required)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("path_id", step.path_id.value())?)
        .bind(i64::from(step.order))
        .bind(step.content.kind().as_str())
        .bind(id_to_i64("object_id", step.content.object_id())?)
        .bind(step.is_required)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("step_id sign overflow".into()))?;
        Ok(step.into_step(StepId::new(id)))
    }

    async fn update_step(&mut self, step: &LearningPathStep) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE learning_path_steps
            SET content_kind = ?1, object_id = ?2, is_required = ?3
            WHERE id = ?4
            ",
        )
        .bind(step.content.kind().as_str())
        .bind(id_to_i64("object_id", step.content.object_id())?)
        .bind(step.is_required)
        .bind(id_to_i64("step_id", step.id.value())?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        not_found_if_untouched(res.rows_affected())
    }

    async fn set_step_order(&mut self, id: StepId, order: u32) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE learning_path_steps SET step_order = ?1 WHERE id = ?2")
            .bind(i64::from(order))
            .bind(id_to_i64("step_id", id.value())?)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        not_found_if_untouched(res.rows_affected())
    }

    async fn delete_step(&mut self, id: StepId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM learning_path_steps WHERE id = ?1")
            .bind(id_to_i64("step_id", id.value())?)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        not_found_if_untouched(res.rows_affected())
    }

    async fn course_steps_in_tenant(
        &mut self,
        course: CourseId,
        tenant: TenantId,
        status: Option<PathStatus>,
    ) -> Result<Vec<LearningPathStep>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT s.id, s.path_id, s.step_order, s.content_kind, s.object_id, s.is_required
            FROM learning_path_steps s
            JOIN learning_paths p ON p.id = s.path_id
            WHERE s.content_kind = 'course'
              AND s.object_id = ?1
              AND p.tenant_id = ?2
              AND (?3 IS NULL OR p.status = ?3)
            ORDER BY s.path_id, s.step_order
            ",
        )
        .bind(id_to_i64("course_id", course.value())?)
        .bind(id_to_i64("tenant_id", tenant.value())?)
        .bind(status.map(PathStatus::as_str))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_step_row)
    }
}
