use lms_core::model::{Course, CourseId, Module, ModuleId};

use super::mapping::{db, id_to_i64, map_course_row, map_module_row};
use super::{SqliteRepository, SqliteTx};
use crate::repository::{CatalogQueries, CatalogRepository, StorageError};

const SELECT_COURSE: &str = "SELECT id, tenant_id, title FROM courses WHERE id = ?1";
const SELECT_MODULE: &str = "SELECT id, course_id, title FROM modules WHERE id = ?1";

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, tenant_id, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                title = excluded.title
            ",
        )
        .bind(id_to_i64("course_id", course.id.value())?)
        .bind(id_to_i64("tenant_id", course.tenant_id.value())?)
        .bind(&course.title)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO modules (id, course_id, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title
            ",
        )
        .bind(id_to_i64("module_id", module.id.value())?)
        .bind(id_to_i64("course_id", module.course_id.value())?)
        .bind(&module.title)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(SELECT_COURSE)
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query(SELECT_MODULE)
            .bind(id_to_i64("module_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(map_module_row).transpose()
    }
}

#[async_trait::async_trait]
impl CatalogQueries for SqliteTx {
    async fn get_course(&mut self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(SELECT_COURSE)
            .bind(id_to_i64("course_id", id.value())?)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn get_module(&mut self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query(SELECT_MODULE)
            .bind(id_to_i64("module_id", id.value())?)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        row.as_ref().map(map_module_row).transpose()
    }
}
