//! Progress Aggregator: the only code that writes progress records.
//!
//! Every function here runs inside a caller-owned transaction and reads step
//! and step-progress rows fresh from it, never from values carried over from
//! an earlier transaction.

use chrono::{DateTime, Utc};
use lms_core::model::{
    Enrollment, EnrollmentStatus, LearningPathStep, NewPathProgress, NewStepProgress, PathId,
    PathProgress, PathStatus, ProgressTally, StepProgress, UserId,
};
use storage::repository::{
    CatalogQueries, PathQueries, PathTx, ProgressQueries, StorageError,
};
use tracing::{debug, info, warn};

/// Re-derive `progress` from the path's current steps and the user's step rows.
///
/// Only persists when a field changed. Returns whether it did.
pub(crate) async fn recompute(
    tx: &mut dyn PathTx,
    progress: &mut PathProgress,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let steps = tx.steps_for_path(progress.path_id).await?;
    let rows = tx.step_progress_for(progress.id).await?;
    let tally = ProgressTally::from_rows(&steps, &rows);

    let before = progress.status;
    if !progress.recompute(&tally, now) {
        debug!(progress_id = %progress.id, status = before.as_str(), "recompute: no change");
        return Ok(false);
    }

    tx.update_path_progress(progress).await?;
    info!(
        user_id = %progress.user_id,
        path_id = %progress.path_id,
        from = before.as_str(),
        to = progress.status.as_str(),
        completed = tally.completed_steps,
        total = tally.total_steps,
        current_step_order = progress.current_step_order,
        "path progress recomputed"
    );
    Ok(true)
}

/// Recompute every user's progress on `path` after its step set changed.
///
/// Returns how many records changed.
pub(crate) async fn recompute_path(
    tx: &mut dyn PathTx,
    path: PathId,
    now: DateTime<Utc>,
) -> Result<usize, StorageError> {
    let mut changed = 0;
    for mut progress in tx.path_progress_for_path(path).await? {
        if recompute(tx, &mut progress, now).await? {
            changed += 1;
        }
    }
    if changed > 0 {
        info!(path_id = %path, changed, "path progress realigned with steps");
    }
    Ok(changed)
}

/// Get-or-create the user's progress on `path` (NOT_STARTED, order 0 when new).
pub(crate) async fn ensure_path_progress(
    tx: &mut dyn PathTx,
    user: UserId,
    path: PathId,
) -> Result<(PathProgress, bool), StorageError> {
    if let Some(existing) = tx.find_path_progress(user, path).await? {
        return Ok((existing, false));
    }
    let created = tx
        .insert_path_progress(NewPathProgress {
            user_id: user,
            path_id: path,
        })
        .await?;
    debug!(user_id = %user, path_id = %path, progress_id = %created.id, "created path progress");
    Ok((created, true))
}

/// Get-or-create the step row for `step` under `progress`.
///
/// The step must belong to the progress record's path.
pub(crate) async fn ensure_step_progress(
    tx: &mut dyn PathTx,
    progress: &PathProgress,
    step: &LearningPathStep,
) -> Result<StepProgress, StorageError> {
    if step.path_id != progress.path_id {
        return Err(StorageError::Conflict(format!(
            "step {} belongs to path {}, not {}",
            step.id, step.path_id, progress.path_id
        )));
    }
    if let Some(existing) = tx.find_step_progress(progress.user_id, step.id).await? {
        return Ok(existing);
    }
    tx.insert_step_progress(NewStepProgress {
        user_id: progress.user_id,
        path_progress_id: progress.id,
        step_id: step.id,
    })
    .await
}

/// Mark every step of a published path in the course's tenant that points at
/// the enrollment's course as completed, then recompute each touched path.
///
/// Returns whether any progress record was created or changed.
pub(crate) async fn apply_course_completion(
    tx: &mut dyn PathTx,
    enrollment: &Enrollment,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    if enrollment.status != EnrollmentStatus::Completed {
        debug!(enrollment_id = %enrollment.id, status = enrollment.status.as_str(), "completion sync skipped");
        return Ok(false);
    }
    let Some(course) = tx.get_course(enrollment.course_id).await? else {
        warn!(enrollment_id = %enrollment.id, course_id = %enrollment.course_id, "enrollment references a missing course; skipping sync");
        return Ok(false);
    };

    let steps = tx
        .course_steps_in_tenant(course.id, course.tenant_id, Some(PathStatus::Published))
        .await?;

    let mut touched = false;
    for step in &steps {
        let (mut progress, created) =
            ensure_path_progress(tx, enrollment.user_id, step.path_id).await?;
        let mut row = ensure_step_progress(tx, &progress, step).await?;

        if row.mark_completed(now) {
            tx.update_step_progress(&row).await?;
            info!(
                user_id = %enrollment.user_id,
                course_id = %course.id,
                path_id = %step.path_id,
                step_id = %step.id,
                "step completed from course enrollment"
            );
            touched = true;
        }
        touched |= created;
        touched |= recompute(tx, &mut progress, now).await?;
    }
    Ok(touched)
}

/// Revert completed step rows pointing at the enrollment's course back to
/// IN_PROGRESS and recompute their paths. Steps without a row are left alone.
///
/// Returns whether anything was reverted.
pub(crate) async fn apply_course_incompletion(
    tx: &mut dyn PathTx,
    enrollment: &Enrollment,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let Some(course) = tx.get_course(enrollment.course_id).await? else {
        warn!(enrollment_id = %enrollment.id, course_id = %enrollment.course_id, "enrollment references a missing course; skipping sync");
        return Ok(false);
    };

    let steps = tx
        .course_steps_in_tenant(course.id, course.tenant_id, None)
        .await?;

    let mut reverted = false;
    for step in &steps {
        let Some(mut row) = tx.find_step_progress(enrollment.user_id, step.id).await? else {
            continue;
        };
        if !row.revert_completion() {
            continue;
        }
        tx.update_step_progress(&row).await?;
        info!(
            user_id = %enrollment.user_id,
            course_id = %course.id,
            step_id = %step.id,
            "step completion reverted; course no longer complete"
        );
        reverted = true;

        if let Some(mut progress) = tx.get_path_progress(row.path_progress_id).await? {
            recompute(tx, &mut progress, now).await?;
        }
    }
    Ok(reverted)
}

/// Route an enrollment status to the matching sync. Statuses other than
/// COMPLETED and ACTIVE are ignored.
pub(crate) async fn dispatch(
    tx: &mut dyn PathTx,
    enrollment: &Enrollment,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    match enrollment.status {
        EnrollmentStatus::Completed => apply_course_completion(tx, enrollment, now).await,
        EnrollmentStatus::Active => apply_course_incompletion(tx, enrollment, now).await,
        EnrollmentStatus::Pending | EnrollmentStatus::Cancelled | EnrollmentStatus::Expired => {
            debug!(enrollment_id = %enrollment.id, status = enrollment.status.as_str(), "no sync for status");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::model::{
        ContentRef, Course, CourseId, NewEnrollment, NewPath, NewStep, PathProgressStatus,
        StepProgressStatus, TenantId,
    };
    use lms_core::time::fixed_now;
    use storage::repository::{
        CatalogRepository, EnrollmentQueries, InMemoryRepository, PathStore,
    };

    async fn repo_with_path(status: PathStatus) -> (InMemoryRepository, PathId) {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&Course {
            id: CourseId::new(1),
            tenant_id: TenantId::new(1),
            title: "C1".into(),
        })
        .await
        .unwrap();
        let mut tx = repo.begin().await.unwrap();
        let path = tx
            .insert_path(NewPath::new(TenantId::new(1), "P", "", status, fixed_now()).unwrap())
            .await
            .unwrap();
        tx.insert_step(NewStep {
            path_id: path.id,
            order: 1,
            content: ContentRef::Course(CourseId::new(1)),
            is_required: true,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (repo, path.id)
    }

    #[tokio::test]
    async fn completion_skips_draft_paths() {
        let (repo, path) = repo_with_path(PathStatus::Draft).await;
        let mut tx = repo.begin().await.unwrap();
        let mut enrollment = tx
            .insert_enrollment(NewEnrollment::active(UserId::new(9), CourseId::new(1), fixed_now()))
            .await
            .unwrap();
        enrollment.transition_to(EnrollmentStatus::Completed, fixed_now());

        assert!(!apply_course_completion(tx.as_mut(), &enrollment, fixed_now()).await.unwrap());
        assert!(tx.find_path_progress(UserId::new(9), path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completion_creates_progress_and_is_idempotent() {
        let (repo, path) = repo_with_path(PathStatus::Published).await;
        let mut tx = repo.begin().await.unwrap();
        let mut enrollment = tx
            .insert_enrollment(NewEnrollment::active(UserId::new(9), CourseId::new(1), fixed_now()))
            .await
            .unwrap();
        enrollment.transition_to(EnrollmentStatus::Completed, fixed_now());

        assert!(apply_course_completion(tx.as_mut(), &enrollment, fixed_now()).await.unwrap());
        let progress = tx
            .find_path_progress(UserId::new(9), path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.status, PathProgressStatus::Completed);
        assert_eq!(progress.current_step_order, 1);

        assert!(!apply_course_completion(tx.as_mut(), &enrollment, fixed_now()).await.unwrap());
        let again = tx.get_path_progress(progress.id).await.unwrap().unwrap();
        assert_eq!(again, progress);
    }

    #[tokio::test]
    async fn incompletion_without_rows_is_a_noop() {
        let (repo, _path) = repo_with_path(PathStatus::Published).await;
        let mut tx = repo.begin().await.unwrap();
        let enrollment = tx
            .insert_enrollment(NewEnrollment::active(UserId::new(9), CourseId::new(1), fixed_now()))
            .await
            .unwrap();
        assert!(!dispatch(tx.as_mut(), &enrollment, fixed_now()).await.unwrap());
    }

    #[tokio::test]
    async fn step_rows_must_match_the_progress_path() {
        let (repo, path) = repo_with_path(PathStatus::Published).await;
        let mut tx = repo.begin().await.unwrap();
        let other = tx
            .insert_path(
                NewPath::new(TenantId::new(1), "Other", "", PathStatus::Draft, fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();
        let foreign = tx
            .insert_step(NewStep {
                path_id: other.id,
                order: 1,
                content: ContentRef::Course(CourseId::new(1)),
                is_required: true,
            })
            .await
            .unwrap();
        let (progress, created) = ensure_path_progress(tx.as_mut(), UserId::new(9), path)
            .await
            .unwrap();
        assert!(created);
        assert!(matches!(
            ensure_step_progress(tx.as_mut(), &progress, &foreign).await,
            Err(StorageError::Conflict(_))
        ));

        let own = tx.steps_for_path(path).await.unwrap().remove(0);
        let row = ensure_step_progress(tx.as_mut(), &progress, &own).await.unwrap();
        assert_eq!(row.status, StepProgressStatus::NotStarted);
    }
}
