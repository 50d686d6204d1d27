use std::sync::Arc;

use lms_core::model::{
    LearningPathStep, PathProgress, PathProgressId, ProgressTally, StepId, StepProgress, UserId,
};
use serde::Serialize;
use storage::repository::{PathQueries, PathStore, PathTx, ProgressQueries};
use tracing::info;

use super::aggregator;
use crate::Clock;
use crate::error::{NotFound, ProgressServiceError};

/// Read model of one user's progress through one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub progress: PathProgress,
    pub steps: Vec<StepProgress>,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// 0.0..=100.0; a path without steps reports 0.
    pub progress_percentage: f64,
    pub next_step: Option<LearningPathStep>,
}

/// Explicit user actions on path progress. Every mutator that touches step
/// rows ends with a recompute in the same transaction.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: Arc<dyn PathStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PathStore>) -> Self {
        Self { clock, store }
    }

    /// Start a path (or resume a paused one) and make sure every step has a row.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the progress record does not exist.
    #[tracing::instrument(skip(self), fields(progress_id = %progress))]
    pub async fn start(&self, progress: PathProgressId) -> Result<PathProgress, ProgressServiceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut current = load_progress(tx.as_mut(), progress).await?;

        let before = current.status;
        if current.start(now) {
            tx.update_path_progress(&current).await?;
            info!(from = before.as_str(), to = current.status.as_str(), "path started");
        }
        let steps = tx.steps_for_path(current.path_id).await?;
        for step in &steps {
            aggregator::ensure_step_progress(tx.as_mut(), &current, step).await?;
        }
        aggregator::recompute(tx.as_mut(), &mut current, now).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::State` unless the path is in progress.
    pub async fn pause(&self, progress: PathProgressId) -> Result<PathProgress, ProgressServiceError> {
        let mut tx = self.store.begin().await?;
        let mut current = load_progress(tx.as_mut(), progress).await?;
        current.pause()?;
        tx.update_path_progress(&current).await?;
        tx.commit().await?;
        info!(progress_id = %progress, "path paused");
        Ok(current)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::State` unless the path is paused.
    pub async fn resume(&self, progress: PathProgressId) -> Result<PathProgress, ProgressServiceError> {
        let mut tx = self.store.begin().await?;
        let mut current = load_progress(tx.as_mut(), progress).await?;
        current.resume()?;
        tx.update_path_progress(&current).await?;
        tx.commit().await?;
        info!(progress_id = %progress, "path resumed");
        Ok(current)
    }

    /// Mark `step` completed for the progress owner and recompute the path.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the progress record does not
    /// exist or the step is not part of its path.
    #[tracing::instrument(skip(self), fields(progress_id = %progress, step_id = %step))]
    pub async fn complete_step(
        &self,
        progress: PathProgressId,
        step: StepId,
    ) -> Result<PathProgress, ProgressServiceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut current = load_progress(tx.as_mut(), progress).await?;
        let target = load_step(tx.as_mut(), &current, step).await?;

        let mut row = aggregator::ensure_step_progress(tx.as_mut(), &current, &target).await?;
        if row.mark_completed(now) {
            tx.update_step_progress(&row).await?;
            info!(user_id = %current.user_id, order = target.order, "step completed");
        }
        aggregator::recompute(tx.as_mut(), &mut current, now).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// Reset `step` to NOT_STARTED and recompute the path. A step without a
    /// row has nothing to reset.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the progress record does not
    /// exist or the step is not part of its path.
    #[tracing::instrument(skip(self), fields(progress_id = %progress, step_id = %step))]
    pub async fn reset_step(
        &self,
        progress: PathProgressId,
        step: StepId,
    ) -> Result<PathProgress, ProgressServiceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut current = load_progress(tx.as_mut(), progress).await?;
        let target = load_step(tx.as_mut(), &current, step).await?;

        if let Some(mut row) = tx.find_step_progress(current.user_id, target.id).await? {
            if row.reset() {
                tx.update_step_progress(&row).await?;
                info!(user_id = %current.user_id, order = target.order, "step reset");
            }
        }
        aggregator::recompute(tx.as_mut(), &mut current, now).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// Progress with step rows, percentage and the next step to work on.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the progress record does not exist.
    pub async fn report(
        &self,
        progress: PathProgressId,
    ) -> Result<ProgressReport, ProgressServiceError> {
        let mut tx = self.store.begin_read().await?;
        let current = load_progress(tx.as_mut(), progress).await?;
        let steps = tx.steps_for_path(current.path_id).await?;
        let rows = tx.step_progress_for(current.id).await?;
        tx.commit().await?;

        let tally = ProgressTally::from_rows(&steps, &rows);
        let next_step = current.next_step(&steps).cloned();
        Ok(ProgressReport {
            completed_steps: tally.completed_steps,
            total_steps: tally.total_steps,
            progress_percentage: tally.percentage(),
            next_step,
            steps: rows,
            progress: current,
        })
    }

    /// Every path progress record of a user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<PathProgress>, ProgressServiceError> {
        let mut tx = self.store.begin_read().await?;
        let all = tx.list_path_progress(user).await?;
        tx.commit().await?;
        Ok(all)
    }
}

async fn load_progress(
    tx: &mut dyn PathTx,
    id: PathProgressId,
) -> Result<PathProgress, ProgressServiceError> {
    tx.get_path_progress(id)
        .await?
        .ok_or_else(|| NotFound::Progress(id).into())
}

async fn load_step(
    tx: &mut dyn PathTx,
    progress: &PathProgress,
    step: StepId,
) -> Result<LearningPathStep, ProgressServiceError> {
    match tx.get_step(step).await? {
        Some(found) if found.path_id == progress.path_id => Ok(found),
        _ => Err(NotFound::Step(step).into()),
    }
}
