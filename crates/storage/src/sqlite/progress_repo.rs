use lms_core::model::{
    NewPathProgress, NewStepProgress, PathId, PathProgress, PathProgressId, StepId, StepProgress,
    StepProgressId, UserId,
};

use super::SqliteTx;
use super::mapping::{db, id_to_i64, map_path_progress_row, map_rows, map_step_progress_row};
use crate::repository::{ProgressQueries, StorageError};

const PATH_PROGRESS_COLUMNS: &str =
    "id, user_id, path_id, status, started_at, completed_at, current_step_order";
const STEP_PROGRESS_COLUMNS: &str =
    "id, user_id, path_progress_id, step_id, status, started_at, completed_at";

fn rowid(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

#[async_trait::async_trait]
impl ProgressQueries for SqliteTx {
    async fn get_path_progress(
        &mut self,
        id: PathProgressId,
    ) -> Result<Option<PathProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PATH_PROGRESS_COLUMNS} FROM learning_path_progress WHERE id = ?1"
        ))
        .bind(id_to_i64("path_progress_id", id.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_path_progress_row).transpose()
    }

    async fn find_path_progress(
        &mut self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<PathProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PATH_PROGRESS_COLUMNS} FROM learning_path_progress \
             WHERE user_id = ?1 AND path_id = ?2"
        ))
        .bind(id_to_i64("user_id", user.value())?)
        .bind(id_to_i64("path_id", path.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_path_progress_row).transpose()
    }

    async fn list_path_progress(
        &mut self,
        user: UserId,
    ) -> Result<Vec<PathProgress>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATH_PROGRESS_COLUMNS} FROM learning_path_progress \
             WHERE user_id = ?1 ORDER BY id"
        ))
        .bind(id_to_i64("user_id", user.value())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_path_progress_row)
    }

    async fn path_progress_for_path(
        &mut self,
        path: PathId,
    ) -> Result<Vec<PathProgress>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATH_PROGRESS_COLUMNS} FROM learning_path_progress \
             WHERE path_id = ?1 ORDER BY id"
        ))
        .bind(id_to_i64("path_id", path.value())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_path_progress_row)
    }

    async fn insert_path_progress(
        &mut self,
        progress: NewPathProgress,
    ) -> Result<PathProgress, StorageError> {
        let draft = progress.into_progress(PathProgressId::new(0));
        let res = sqlx::query(
            r"
            INSERT INTO learning_path_progress
                (user_id, path_id, status, started_at, completed_at, current_step_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("user_id", draft.user_id.value())?)
        .bind(id_to_i64("path_id", draft.path_id.value())?)
        .bind(draft.status.as_str())
        .bind(draft.started_at)
        .bind(draft.completed_at)
        .bind(i64::from(draft.current_step_order))
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        let id = rowid("path_progress_id", res.last_insert_rowid())?;
        Ok(PathProgress {
            id: PathProgressId::new(id),
            ..draft
        })
    }

    async fn update_path_progress(&mut self, progress: &PathProgress) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE learning_path_progress
            SET status = ?1, started_at = ?2, completed_at = ?3, current_step_order = ?4
            WHERE id = ?5
            ",
        )
        .bind(progress.status.as_str())
        .bind(progress.started_at)
        .bind(progress.completed_at)
        .bind(i64::from(progress.current_step_order))
        .bind(id_to_i64("path_progress_id", progress.id.value())?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn step_progress_for(
        &mut self,
        progress: PathProgressId,
    ) -> Result<Vec<StepProgress>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_PROGRESS_COLUMNS} FROM learning_path_step_progress \
             WHERE path_progress_id = ?1 ORDER BY id"
        ))
        .bind(id_to_i64("path_progress_id", progress.value())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        map_rows(&rows, map_step_progress_row)
    }

    async fn find_step_progress(
        &mut self,
        user: UserId,
        step: StepId,
    ) -> Result<Option<StepProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STEP_PROGRESS_COLUMNS} FROM learning_path_step_progress \
             WHERE user_id = ?1 AND step_id = ?2"
        ))
        .bind(id_to_i64("user_id", user.value())?)
        .bind(id_to_i64("step_id", step.value())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(map_step_progress_row).transpose()
    }

    async fn insert_step_progress(
        &mut self,
        progress: NewStepProgress,
    ) -> Result<StepProgress, StorageError> {
        let draft = progress.into_step_progress(StepProgressId::new(0));
        let res = sqlx::query(
            r"
            INSERT INTO learning_path_step_progress
                (user_id, path_progress_id, step_id, status, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("user_id", draft.user_id.value())?)
        .bind(id_to_i64("path_progress_id", draft.path_progress_id.value())?)
        .bind(id_to_i64("step_id", draft.step_id.value())?)
        .bind(draft.status.as_str())
        .bind(draft.started_at)
        .bind(draft.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        let id = rowid("step_progress_id", res.last_insert_rowid())?;
        Ok(StepProgress {
            id: StepProgressId::new(id),
            ..draft
        })
    }

    async fn update_step_progress(&mut self, progress: &StepProgress) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE learning_path_step_progress
            SET status = ?1, started_at = ?2, completed_at = ?3
            WHERE id = ?4
            ",
        )
        .bind(progress.status.as_str())
        .bind(progress.started_at)
        .bind(progress.completed_at)
        .bind(id_to_i64("step_progress_id", progress.id.value())?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
