use std::sync::Arc;

use lms_core::model::{
    LearningPath, LearningPathStep, NewPath, NewStep, PathId, PathStatus, ReorderPlan,
    StepContentInput, StepId, TenantId, next_step_order, slug_candidates,
};
use storage::repository::{PathQueries, PathStore, PathTx, StorageError};
use tracing::info;

use super::aggregator;
use super::resolve::validate_content;
use crate::Clock;
use crate::error::{NotFound, PathServiceError};

/// Partial edit of a step. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepUpdate {
    pub content: Option<StepContentInput>,
    pub is_required: Option<bool>,
}

/// Author-facing operations on paths and their steps, including the Step Reorder Engine.
#[derive(Clone)]
pub struct PathAuthoringService {
    clock: Clock,
    store: Arc<dyn PathStore>,
}

impl PathAuthoringService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PathStore>) -> Self {
        Self { clock, store }
    }

    /// Create a path with a slug derived from the title, suffixed `-1`, `-2`, ... until unique.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::Validation` for a blank title.
    /// Returns `PathServiceError::Storage` if persistence fails.
    #[tracing::instrument(skip(self, description), fields(tenant_id = %tenant))]
    pub async fn create_path(
        &self,
        tenant: TenantId,
        title: &str,
        description: &str,
        status: PathStatus,
    ) -> Result<LearningPath, PathServiceError> {
        let mut draft = NewPath::new(tenant, title, description, status, self.clock.now())?;
        let mut tx = self.store.begin().await?;

        let base = draft.slug.clone();
        for candidate in slug_candidates(&base) {
            if !tx.slug_exists(&candidate).await? {
                draft.slug = candidate;
                break;
            }
        }
        let path = tx.insert_path(draft).await?;
        tx.commit().await?;

        info!(path_id = %path.id, slug = %path.slug, status = path.status.as_str(), "learning path created");
        Ok(path)
    }

    /// # Errors
    ///
    /// Returns `PathServiceError::NotFound` if the path does not exist.
    pub async fn set_path_status(
        &self,
        path: PathId,
        status: PathStatus,
    ) -> Result<LearningPath, PathServiceError> {
        let mut tx = self.store.begin().await?;
        let mut current = load_path(tx.as_mut(), path).await?;
        if current.status != status {
            tx.set_path_status(path, status).await?;
            info!(path_id = %path, from = current.status.as_str(), to = status.as_str(), "path status changed");
            current.status = status;
        }
        tx.commit().await?;
        Ok(current)
    }

    /// Delete a path with its steps and every user's progress on it.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::NotFound` if the path does not exist.
    pub async fn delete_path(&self, path: PathId) -> Result<(), PathServiceError> {
        let mut tx = self.store.begin().await?;
        match tx.delete_path(path).await {
            Err(StorageError::NotFound) => return Err(NotFound::Path(path).into()),
            other => other?,
        }
        tx.commit().await?;
        info!(path_id = %path, "learning path deleted");
        Ok(())
    }

    /// Paths of a tenant ordered by title.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::Storage` if repository access fails.
    pub async fn list_paths(&self, tenant: TenantId) -> Result<Vec<LearningPath>, PathServiceError> {
        let mut tx = self.store.begin_read().await?;
        let paths = tx.list_paths(tenant).await?;
        tx.commit().await?;
        Ok(paths)
    }

    /// # Errors
    ///
    /// Returns `PathServiceError::NotFound` if the path does not exist.
    pub async fn list_steps(&self, path: PathId) -> Result<Vec<LearningPathStep>, PathServiceError> {
        let mut tx = self.store.begin_read().await?;
        load_path(tx.as_mut(), path).await?;
        let steps = tx.steps_for_path(path).await?;
        tx.commit().await?;
        Ok(steps)
    }

    /// Append a step pointing at `content` and recompute every user's progress on the path.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::Validation` if the content kind is unknown, the
    /// item does not exist, or it belongs to another tenant.
    /// Returns `PathServiceError::NotFound` if the path does not exist.
    #[tracing::instrument(skip(self, content), fields(path_id = %path))]
    pub async fn add_step(
        &self,
        path: PathId,
        content: StepContentInput,
        is_required: bool,
    ) -> Result<LearningPathStep, PathServiceError> {
        let content = content.into_ref()?;
        let mut tx = self.store.begin().await?;
        let owner = load_path(tx.as_mut(), path).await?;
        let resolved = validate_content(tx.as_mut(), content, owner.tenant_id).await?;

        let steps = tx.steps_for_path(path).await?;
        let step = tx
            .insert_step(NewStep {
                path_id: path,
                order: next_step_order(&steps),
                content,
                is_required,
            })
            .await?;
        aggregator::recompute_path(tx.as_mut(), path, self.clock.now()).await?;
        tx.commit().await?;

        info!(step_id = %step.id, order = step.order, content = %content, title = %resolved.title, "step added");
        Ok(step)
    }

    /// Change a step's content or required flag. New content is validated like on creation.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::NotFound` if the step is not part of `path`.
    /// Returns `PathServiceError::Validation` for invalid content.
    pub async fn update_step(
        &self,
        path: PathId,
        step: StepId,
        update: StepUpdate,
    ) -> Result<LearningPathStep, PathServiceError> {
        let mut tx = self.store.begin().await?;
        let owner = load_path(tx.as_mut(), path).await?;
        let mut current = load_step(tx.as_mut(), path, step).await?;

        if let Some(content) = update.content {
            let content = content.into_ref()?;
            validate_content(tx.as_mut(), content, owner.tenant_id).await?;
            current.content = content;
        }
        if let Some(is_required) = update.is_required {
            current.is_required = is_required;
        }
        tx.update_step(&current).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// Delete a step, close the gap it leaves in the ordering and recompute
    /// every user's progress on the path.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::NotFound` if the step is not part of `path`.
    pub async fn delete_step(&self, path: PathId, step: StepId) -> Result<(), PathServiceError> {
        let mut tx = self.store.begin().await?;
        load_step(tx.as_mut(), path, step).await?;
        tx.delete_step(step).await?;

        let remaining = tx.steps_for_path(path).await?;
        let plan = ReorderPlan::dense(&remaining);
        if !plan.is_noop(&remaining) {
            apply_plan(tx.as_mut(), &plan).await?;
        }
        aggregator::recompute_path(tx.as_mut(), path, self.clock.now()).await?;
        tx.commit().await?;

        info!(path_id = %path, step_id = %step, remaining = remaining.len(), "step deleted");
        Ok(())
    }

    /// Reorder all steps of `path` to follow `ordered`: the step at index `i`
    /// gets order `i + 1`.
    ///
    /// # Errors
    ///
    /// Returns `PathServiceError::Validation` if `ordered` does not name every
    /// step of the path exactly once; no order is changed then.
    /// Returns `PathServiceError::NotFound` if the path does not exist.
    #[tracing::instrument(skip(self, ordered), fields(path_id = %path, steps = ordered.len()))]
    pub async fn reorder_steps(
        &self,
        path: PathId,
        ordered: &[StepId],
    ) -> Result<Vec<LearningPathStep>, PathServiceError> {
        let mut tx = self.store.begin().await?;
        load_path(tx.as_mut(), path).await?;
        let current = tx.steps_for_path(path).await?;

        let plan = ReorderPlan::from_request(&current, ordered)?;
        if !plan.is_noop(&current) {
            apply_plan(tx.as_mut(), &plan).await?;
            aggregator::recompute_path(tx.as_mut(), path, self.clock.now()).await?;
        }
        let reordered = tx.steps_for_path(path).await?;
        tx.commit().await?;

        info!(path_id = %path, steps = reordered.len(), "steps reordered");
        Ok(reordered)
    }
}

async fn load_path(tx: &mut dyn PathTx, path: PathId) -> Result<LearningPath, PathServiceError> {
    tx.get_path(path)
        .await?
        .ok_or_else(|| NotFound::Path(path).into())
}

async fn load_step(
    tx: &mut dyn PathTx,
    path: PathId,
    step: StepId,
) -> Result<LearningPathStep, PathServiceError> {
    match tx.get_step(step).await? {
        Some(found) if found.path_id == path => Ok(found),
        _ => Err(NotFound::Step(step).into()),
    }
}

/// Renumber in two passes, staged orders first, so `(path, order)` stays
/// unique after every single write.
async fn apply_plan(tx: &mut dyn PathTx, plan: &ReorderPlan) -> Result<(), StorageError> {
    for step_move in plan.moves() {
        tx.set_step_order(step_move.step_id, step_move.staged_order)
            .await?;
    }
    for step_move in plan.moves() {
        tx.set_step_order(step_move.step_id, step_move.final_order)
            .await?;
    }
    Ok(())
}
