use std::sync::Arc;

use chrono::{DateTime, Utc};
use lms_core::model::{
    ContentRef, CourseId, Enrollment, LearningPathStep, NewEnrollment, PathId, PathProgress,
    UserId,
};
use serde::Serialize;
use storage::repository::{
    EnrollmentQueries, PathQueries, PathStore, PathTx, ProgressQueries, StorageError,
};
use tracing::{debug, info};

use super::aggregator;
use super::resolve::owning_course;
use crate::Clock;
use crate::error::{EnrollmentServiceError, NotFound};

/// Outcome of enrolling a user in a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEnrollment {
    pub progress: PathProgress,
    /// False when the user already had progress on the path.
    pub created: bool,
    /// One enrollment per course the path references, created or reused.
    pub course_enrollments: Vec<Enrollment>,
}

/// Enrollment Cascade: enrolling in a path enrolls in every course it references.
#[derive(Clone)]
pub struct PathEnrollmentService {
    clock: Clock,
    store: Arc<dyn PathStore>,
}

impl PathEnrollmentService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn PathStore>) -> Self {
        Self { clock, store }
    }

    /// Enroll `user` in `path`.
    ///
    /// Creates (or reuses) the path progress, backfills a step row for every
    /// step, enrolls the user in every referenced course without touching
    /// existing enrollments, and carries already completed courses into the
    /// path's progress. Repeat calls return the same progress with `created == false`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the path does not exist.
    /// Returns `EnrollmentServiceError::Storage` if any write fails; the whole
    /// attempt is rolled back then.
    #[tracing::instrument(skip(self), fields(user_id = %user, path_id = %path))]
    pub async fn enroll_in_path(
        &self,
        user: UserId,
        path: PathId,
    ) -> Result<PathEnrollment, EnrollmentServiceError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        if tx.get_path(path).await?.is_none() {
            return Err(NotFound::Path(path).into());
        }

        let (progress, created) = aggregator::ensure_path_progress(tx.as_mut(), user, path).await?;
        let steps = tx.steps_for_path(path).await?;
        for step in &steps {
            aggregator::ensure_step_progress(tx.as_mut(), &progress, step).await?;
        }

        let course_enrollments = enroll_in_courses(tx.as_mut(), user, &steps, now).await?;

        for enrollment in course_enrollments.iter().filter(|e| e.is_completed()) {
            backfill_completion(tx.as_mut(), &progress, &steps, enrollment, now).await?;
            aggregator::apply_course_completion(tx.as_mut(), enrollment, now).await?;
        }

        let mut progress = tx
            .get_path_progress(progress.id)
            .await?
            .ok_or(StorageError::NotFound)?;
        aggregator::recompute(tx.as_mut(), &mut progress, now).await?;
        tx.commit().await?;

        info!(
            created,
            status = progress.status.as_str(),
            courses = course_enrollments.len(),
            "user enrolled in learning path"
        );
        Ok(PathEnrollment {
            progress,
            created,
            course_enrollments,
        })
    }
}

/// Get-or-create an ACTIVE enrollment for every course the steps reference,
/// in step order and deduplicated by course.
async fn enroll_in_courses(
    tx: &mut dyn PathTx,
    user: UserId,
    steps: &[LearningPathStep],
    now: DateTime<Utc>,
) -> Result<Vec<Enrollment>, StorageError> {
    let mut seen: Vec<CourseId> = Vec::new();
    let mut enrollments = Vec::new();

    for step in steps {
        let Some(course) = owning_course(tx, step.content).await? else {
            continue;
        };
        if seen.contains(&course) {
            continue;
        }
        seen.push(course);

        let enrollment = match tx.find_enrollment(user, course).await? {
            Some(existing) => {
                debug!(
                    course_id = %course,
                    status = existing.status.as_str(),
                    "reusing existing course enrollment"
                );
                existing
            }
            None => {
                let created = tx
                    .insert_enrollment(NewEnrollment::active(user, course, now))
                    .await?;
                info!(course_id = %course, enrollment_id = %created.id, "auto-enrolled in course");
                created
            }
        };
        enrollments.push(enrollment);
    }
    Ok(enrollments)
}

/// Mark this path's steps on a course the user already finished as
/// completed, dated from the enrollment. Covers paths that are not published.
async fn backfill_completion(
    tx: &mut dyn PathTx,
    progress: &PathProgress,
    steps: &[LearningPathStep],
    enrollment: &Enrollment,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let completed_at = enrollment.completed_at.unwrap_or(now);
    let course_steps = steps
        .iter()
        .filter(|s| s.content == ContentRef::Course(enrollment.course_id));

    for step in course_steps {
        let mut row = aggregator::ensure_step_progress(tx, progress, step).await?;
        if row.mark_completed_at(completed_at, enrollment.enrolled_at) {
            tx.update_step_progress(&row).await?;
            info!(
                course_id = %enrollment.course_id,
                step_id = %step.id,
                "synced existing course completion"
            );
        }
    }
    Ok(())
}
