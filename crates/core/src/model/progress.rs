use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ProgressStateError;
use crate::model::ids::{PathId, PathProgressId, StepId, StepProgressId, UserId};
use crate::model::path::LearningPathStep;

//
// ─── STATUSES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl PathProgressStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PathProgressStatus::NotStarted => "NOT_STARTED",
            PathProgressStatus::InProgress => "IN_PROGRESS",
            PathProgressStatus::Completed => "COMPLETED",
            PathProgressStatus::Paused => "PAUSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl StepProgressStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StepProgressStatus::NotStarted => "NOT_STARTED",
            StepProgressStatus::InProgress => "IN_PROGRESS",
            StepProgressStatus::Completed => "COMPLETED",
            StepProgressStatus::Skipped => "SKIPPED",
        }
    }
}

//
// ─── TALLY ─────────────────────────────────────────────────────────────────────
//

/// Counts over a path's steps and one user's step-progress rows, read fresh
/// inside the transaction that recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressTally {
    pub total_steps: usize,
    pub completed_steps: usize,
    /// Highest order value among the path's steps (0 when empty).
    pub last_step_order: u32,
    /// Highest order value among completed steps.
    pub furthest_completed_order: Option<u32>,
}

impl ProgressTally {
    /// Build a tally. Rows for steps outside `steps` are ignored.
    #[must_use]
    pub fn from_rows(steps: &[LearningPathStep], rows: &[StepProgress]) -> Self {
        let orders: HashMap<StepId, u32> = steps.iter().map(|s| (s.id, s.order)).collect();

        let completed: Vec<u32> = rows
            .iter()
            .filter(|row| row.status == StepProgressStatus::Completed)
            .filter_map(|row| orders.get(&row.step_id).copied())
            .collect();

        Self {
            total_steps: steps.len(),
            completed_steps: completed.len(),
            last_step_order: orders.values().copied().max().unwrap_or(0),
            furthest_completed_order: completed.into_iter().max(),
        }
    }

    /// Completed share of the path in percent. A path without steps reports 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps as f64 / self.total_steps as f64) * 100.0
    }
}

//
// ─── PATH PROGRESS ─────────────────────────────────────────────────────────────
//

/// One user's aggregate progress through one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathProgress {
    pub id: PathProgressId,
    pub user_id: UserId,
    pub path_id: PathId,
    pub status: PathProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 0 until a step is completed; otherwise the highest completed step order.
    pub current_step_order: u32,
}

impl PathProgress {
    /// Re-derive status, timestamps and `current_step_order` from `tally`.
    ///
    /// Returns `true` if any field changed.
    pub fn recompute(&mut self, tally: &ProgressTally, now: DateTime<Utc>) -> bool {
        let before = self.clone();

        if tally.total_steps == 0 {
            self.enter_completed(now);
            self.current_step_order = 0;
        } else if tally.completed_steps >= tally.total_steps {
            self.enter_completed(now);
            self.current_step_order = tally.last_step_order;
        } else if tally.completed_steps > 0 {
            match self.status {
                PathProgressStatus::NotStarted => {
                    self.status = PathProgressStatus::InProgress;
                    self.started_at = Some(now);
                }
                PathProgressStatus::Completed => {
                    self.status = PathProgressStatus::InProgress;
                    self.completed_at = None;
                }
                PathProgressStatus::Paused => self.status = PathProgressStatus::InProgress,
                PathProgressStatus::InProgress => {}
            }
            self.current_step_order = tally.furthest_completed_order.unwrap_or(0);
        } else {
            // Nothing completed: NOT_STARTED, IN_PROGRESS and PAUSED stay as they are.
            if self.status == PathProgressStatus::Completed {
                self.status = PathProgressStatus::InProgress;
                self.completed_at = None;
            }
            self.current_step_order = 0;
        }

        *self != before
    }

    fn enter_completed(&mut self, now: DateTime<Utc>) {
        if self.status != PathProgressStatus::Completed {
            self.status = PathProgressStatus::Completed;
            self.completed_at = Some(now);
            self.started_at.get_or_insert(now);
        }
    }

    /// Explicit start. Also resumes a paused path.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            PathProgressStatus::NotStarted => {
                self.status = PathProgressStatus::InProgress;
                self.started_at = Some(now);
                true
            }
            PathProgressStatus::Paused => {
                self.status = PathProgressStatus::InProgress;
                true
            }
            PathProgressStatus::InProgress | PathProgressStatus::Completed => false,
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressStateError::NotInProgress` unless the path is in progress.
    pub fn pause(&mut self) -> Result<(), ProgressStateError> {
        if self.status != PathProgressStatus::InProgress {
            return Err(ProgressStateError::NotInProgress(self.status.as_str()));
        }
        self.status = PathProgressStatus::Paused;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressStateError::NotPaused` unless the path is paused.
    pub fn resume(&mut self) -> Result<(), ProgressStateError> {
        if self.status != PathProgressStatus::Paused {
            return Err(ProgressStateError::NotPaused(self.status.as_str()));
        }
        self.status = PathProgressStatus::InProgress;
        Ok(())
    }

    /// The step to work on next: the first step after `current_step_order`.
    #[must_use]
    pub fn next_step<'a>(&self, steps: &'a [LearningPathStep]) -> Option<&'a LearningPathStep> {
        steps
            .iter()
            .filter(|s| s.order > self.current_step_order)
            .min_by_key(|s| s.order)
    }
}

/// Path progress that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPathProgress {
    pub user_id: UserId,
    pub path_id: PathId,
}

impl NewPathProgress {
    #[must_use]
    pub fn into_progress(self, id: PathProgressId) -> PathProgress {
        PathProgress {
            id,
            user_id: self.user_id,
            path_id: self.path_id,
            status: PathProgressStatus::NotStarted,
            started_at: None,
            completed_at: None,
            current_step_order: 0,
        }
    }
}

//
// ─── STEP PROGRESS ─────────────────────────────────────────────────────────────
//

/// One user's state on one step, always owned by a `PathProgress` of the same path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub id: StepProgressId,
    pub user_id: UserId,
    pub path_progress_id: PathProgressId,
    pub step_id: StepId,
    pub status: StepProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepProgress {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == StepProgressStatus::Completed
    }

    /// Mark completed at `now`. No-op if already completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        self.mark_completed_at(now, now)
    }

    /// Mark completed with explicit timestamps; `started_at` only fills a gap.
    pub fn mark_completed_at(
        &mut self,
        completed_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = StepProgressStatus::Completed;
        self.completed_at = Some(completed_at);
        self.started_at.get_or_insert(started_at);
        true
    }

    /// Undo a completion the user had engaged with: back to IN_PROGRESS, never NOT_STARTED.
    pub fn revert_completion(&mut self) -> bool {
        if !self.is_completed() {
            return false;
        }
        self.status = StepProgressStatus::InProgress;
        self.completed_at = None;
        true
    }

    /// Explicit user reset to NOT_STARTED.
    pub fn reset(&mut self) -> bool {
        if self.status == StepProgressStatus::NotStarted && self.completed_at.is_none() {
            return false;
        }
        self.status = StepProgressStatus::NotStarted;
        self.completed_at = None;
        true
    }
}

/// Step progress that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewStepProgress {
    pub user_id: UserId,
    pub path_progress_id: PathProgressId,
    pub step_id: StepId,
}

impl NewStepProgress {
    #[must_use]
    pub fn into_step_progress(self, id: StepProgressId) -> StepProgress {
        StepProgress {
            id,
            user_id: self.user_id,
            path_progress_id: self.path_progress_id,
            step_id: self.step_id,
            status: StepProgressStatus::NotStarted,
            started_at: None,
            completed_at: None,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
