//! Shared error types for the services crate.

use thiserror::Error;

use lms_core::model::{CourseId, EnrollmentId, PathId, PathProgressId, StepId};
use lms_core::{ProgressStateError, ValidationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// A record the caller named does not exist (or is not part of the named parent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum NotFound {
    #[error("learning path {0} not found")]
    Path(PathId),
    #[error("step {0} not found in this learning path")]
    Step(StepId),
    #[error("path progress {0} not found")]
    Progress(PathProgressId),
    #[error("enrollment {0} not found")]
    Enrollment(EnrollmentId),
    #[error("course {0} not found")]
    Course(CourseId),
}

/// Errors emitted by `PathAuthoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PathServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService` and `ProgressSyncService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    State(#[from] ProgressStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService` and `PathEnrollmentService`.
///
/// A failed path enrollment is reported as a single error; nothing of the
/// attempt is persisted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping the service graph.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
