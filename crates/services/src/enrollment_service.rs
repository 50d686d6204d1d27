use std::sync::Arc;

use lms_core::model::{CourseId, Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment, UserId};
use serde::Serialize;
use storage::repository::{CatalogQueries, EnrollmentQueries, PathStore};
use tracing::info;

use crate::Clock;
use crate::error::{EnrollmentServiceError, NotFound};
use crate::paths;

/// Result of an enrollment status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentTransition {
    pub enrollment: Enrollment,
    pub changed: bool,
    /// Whether the sync that followed touched any path progress.
    pub progress_touched: bool,
}

/// Minimal course-enrollment surface the path engine depends on.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    store: Arc<dyn PathStore>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PathStore>) -> Self {
        Self { clock, store }
    }

    /// Get-or-create an ACTIVE enrollment of `user` in `course`. Returns the
    /// enrollment and whether it was created.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the course does not exist.
    pub async fn enroll(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<(Enrollment, bool), EnrollmentServiceError> {
        let mut tx = self.store.begin().await?;
        if tx.get_course(course).await?.is_none() {
            return Err(NotFound::Course(course).into());
        }
        if let Some(existing) = tx.find_enrollment(user, course).await? {
            tx.commit().await?;
            return Ok((existing, false));
        }
        let created = tx
            .insert_enrollment(NewEnrollment::active(user, course, self.clock.now()))
            .await?;
        tx.commit().await?;
        info!(user_id = %user, course_id = %course, enrollment_id = %created.id, "enrolled in course");
        Ok((created, true))
    }

    /// Move an enrollment to `status` and, when the status actually changed,
    /// sync path progress in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the enrollment does not exist.
    /// Returns `EnrollmentServiceError::Storage` if any write fails; neither the
    /// status change nor the sync is persisted then.
    #[tracing::instrument(skip(self), fields(enrollment_id = %enrollment, status = status.as_str()))]
    pub async fn set_status(
        &self,
        enrollment: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<EnrollmentTransition, EnrollmentServiceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut current = tx
            .get_enrollment(enrollment)
            .await?
            .ok_or(NotFound::Enrollment(enrollment))?;

        let from = current.status;
        let changed = current.transition_to(status, now);
        let mut progress_touched = false;
        if changed {
            tx.update_enrollment(&current).await?;
            info!(from = from.as_str(), to = status.as_str(), "enrollment status changed");
            progress_touched = paths::dispatch(tx.as_mut(), &current, now).await?;
        }
        tx.commit().await?;

        Ok(EnrollmentTransition {
            enrollment: current,
            changed,
            progress_touched,
        })
    }
}
