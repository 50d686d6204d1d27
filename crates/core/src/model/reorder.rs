use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::model::ids::StepId;
use crate::model::path::LearningPathStep;

/// Added to a step's old order during the staging pass. Larger than any
/// realistic step count, so staged orders never collide with final ones.
pub const STAGING_OFFSET: u32 = 10_000;

/// One step's movement through the two-pass renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMove {
    pub step_id: StepId,
    pub staged_order: u32,
    pub final_order: u32,
}

/// Renumbering of a path's steps to `1..=N` that never violates `(path, order)`
/// uniqueness when applied staging-pass first, final-pass second.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReorderPlan {
    moves: Vec<StepMove>,
}

impl ReorderPlan {
    /// Plan a reorder of `current` into the sequence given by `requested`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::StepCountMismatch` if the lengths differ, and
    /// `ValidationError::InvalidStepIds` if `requested` names a step outside
    /// `current` or repeats one.
    pub fn from_request(
        current: &[LearningPathStep],
        requested: &[StepId],
    ) -> Result<Self, ValidationError> {
        if requested.len() != current.len() {
            return Err(ValidationError::StepCountMismatch {
                expected: current.len(),
                actual: requested.len(),
            });
        }

        let old_orders: HashMap<StepId, u32> = current.iter().map(|s| (s.id, s.order)).collect();
        let mut seen = HashSet::with_capacity(requested.len());
        let mut unknown = Vec::new();
        let mut duplicates = Vec::new();
        for id in requested {
            if !old_orders.contains_key(id) {
                unknown.push(*id);
            } else if !seen.insert(*id) {
                duplicates.push(*id);
            }
        }
        if !unknown.is_empty() || !duplicates.is_empty() {
            return Err(ValidationError::InvalidStepIds {
                unknown,
                duplicates,
            });
        }

        Ok(Self::build(requested.iter().map(|id| (*id, old_orders[id]))))
    }

    /// Close gaps: keep the relative order of `remaining` and number it `1..=N`.
    #[must_use]
    pub fn dense(remaining: &[LearningPathStep]) -> Self {
        let mut sorted: Vec<&LearningPathStep> = remaining.iter().collect();
        sorted.sort_by_key(|s| s.order);
        Self::build(sorted.into_iter().map(|s| (s.id, s.order)))
    }

    fn build(sequence: impl Iterator<Item = (StepId, u32)>) -> Self {
        let moves = sequence
            .zip(1u32..)
            .map(|((step_id, old_order), final_order)| StepMove {
                step_id,
                staged_order: STAGING_OFFSET + old_order,
                final_order,
            })
            .collect();
        Self { moves }
    }

    #[must_use]
    pub fn moves(&self) -> &[StepMove] {
        &self.moves
    }

    /// True when every step already sits at its final order.
    #[must_use]
    pub fn is_noop(&self, current: &[LearningPathStep]) -> bool {
        let old: HashMap<StepId, u32> = current.iter().map(|s| (s.id, s.order)).collect();
        self.moves
            .iter()
            .all(|m| old.get(&m.step_id) == Some(&m.final_order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentRef, CourseId, PathId};

    fn steps(orders: &[u32]) -> Vec<LearningPathStep> {
        orders
            .iter()
            .enumerate()
            .map(|(i, order)| LearningPathStep {
                id: StepId::new(i as u64 + 1),
                path_id: PathId::new(1),
                order: *order,
                content: ContentRef::Course(CourseId::new(i as u64 + 1)),
                is_required: true,
            })
            .collect()
    }

    #[test]
    fn plan_assigns_input_positions() {
        let current = steps(&[1, 2, 3]);
        let plan =
            ReorderPlan::from_request(&current, &[StepId::new(3), StepId::new(1), StepId::new(2)])
                .unwrap();

        let finals: Vec<(u64, u32)> = plan
            .moves()
            .iter()
            .map(|m| (m.step_id.value(), m.final_order))
            .collect();
        assert_eq!(finals, vec![(3, 1), (1, 2), (2, 3)]);
        assert_eq!(plan.moves()[0].staged_order, STAGING_OFFSET + 3);
        assert!(!plan.is_noop(&current));
    }

    #[test]
    fn staged_orders_never_overlap_final_orders() {
        let current = steps(&[1, 2, 3, 4]);
        let ids: Vec<StepId> = current.iter().rev().map(|s| s.id).collect();
        let plan = ReorderPlan::from_request(&current, &ids).unwrap();

        let staged: HashSet<u32> = plan.moves().iter().map(|m| m.staged_order).collect();
        assert_eq!(staged.len(), 4);
        assert!(plan.moves().iter().all(|m| !staged.contains(&m.final_order)));
    }

    #[test]
    fn count_mismatch_is_reported_first() {
        let current = steps(&[1, 2]);
        let err = ReorderPlan::from_request(&current, &[StepId::new(1)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::StepCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn duplicate_and_foreign_ids_are_rejected() {
        let current = steps(&[1, 2]);
        let err = ReorderPlan::from_request(&current, &[StepId::new(1), StepId::new(1)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidStepIds {
                unknown: vec![],
                duplicates: vec![StepId::new(1)]
            }
        );

        let err =
            ReorderPlan::from_request(&current, &[StepId::new(1), StepId::new(77)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStepIds { ref unknown, .. } if unknown == &vec![StepId::new(77)]));
    }

    #[test]
    fn dense_closes_gaps_in_existing_order() {
        let current = steps(&[4, 1, 7]);
        let plan = ReorderPlan::dense(&current);
        let finals: Vec<(u64, u32)> = plan
            .moves()
            .iter()
            .map(|m| (m.step_id.value(), m.final_order))
            .collect();
        assert_eq!(finals, vec![(2, 1), (1, 2), (3, 3)]);

        let already_dense = steps(&[1, 2, 3]);
        assert!(ReorderPlan::dense(&already_dense).is_noop(&already_dense));
    }
}
