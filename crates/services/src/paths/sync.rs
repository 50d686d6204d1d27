use std::sync::Arc;

use lms_core::model::{Enrollment, EnrollmentId};
use storage::repository::{EnrollmentQueries, PathStore, PathTx};

use super::aggregator;
use crate::Clock;
use crate::error::{NotFound, ProgressServiceError};

/// Entry point for the enrollment subsystem: reacts to course enrollment
/// status changes by updating path progress.
///
/// Each call runs in its own transaction and reads the enrollment from it, so
/// a redelivered event always acts on the stored status.
#[derive(Clone)]
pub struct ProgressSyncService {
    clock: Clock,
    store: Arc<dyn PathStore>,
}

impl ProgressSyncService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PathStore>) -> Self {
        Self { clock, store }
    }

    /// Dispatch on the enrollment's status: COMPLETED syncs completion, ACTIVE
    /// reverts completion, anything else does nothing.
    ///
    /// Returns whether any progress record was touched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the enrollment does not exist.
    /// Returns `ProgressServiceError::Storage` if the transaction fails; nothing is applied then.
    #[tracing::instrument(skip(self), fields(enrollment_id = %enrollment))]
    pub async fn sync(&self, enrollment: EnrollmentId) -> Result<bool, ProgressServiceError> {
        let mut tx = self.store.begin().await?;
        let stored = load_enrollment(tx.as_mut(), enrollment).await?;
        let touched = aggregator::dispatch(tx.as_mut(), &stored, self.clock.now()).await?;
        tx.commit().await?;
        Ok(touched)
    }

    /// Mark steps referencing the enrollment's course as completed in every
    /// published path of the course's tenant. A no-op unless the enrollment is COMPLETED.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the enrollment does not exist.
    /// Returns `ProgressServiceError::Storage` if the transaction fails.
    pub async fn apply_course_completion(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<bool, ProgressServiceError> {
        let mut tx = self.store.begin().await?;
        let stored = load_enrollment(tx.as_mut(), enrollment).await?;
        let touched =
            aggregator::apply_course_completion(tx.as_mut(), &stored, self.clock.now()).await?;
        tx.commit().await?;
        Ok(touched)
    }

    /// Revert completed steps referencing the enrollment's course to IN_PROGRESS.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the enrollment does not exist.
    /// Returns `ProgressServiceError::Storage` if the transaction fails.
    pub async fn apply_course_incompletion(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<bool, ProgressServiceError> {
        let mut tx = self.store.begin().await?;
        let stored = load_enrollment(tx.as_mut(), enrollment).await?;
        let touched =
            aggregator::apply_course_incompletion(tx.as_mut(), &stored, self.clock.now()).await?;
        tx.commit().await?;
        Ok(touched)
    }
}

async fn load_enrollment(
    tx: &mut dyn PathTx,
    id: EnrollmentId,
) -> Result<Enrollment, ProgressServiceError> {
    tx.get_enrollment(id)
        .await?
        .ok_or_else(|| NotFound::Enrollment(id).into())
}
