use async_trait::async_trait;
use lms_core::model::{
    Course, CourseId, Enrollment, EnrollmentId, LearningPath, LearningPathStep, Module, ModuleId,
    NewEnrollment, NewPath, NewPathProgress, NewStep, NewStepProgress, PathId, PathProgress,
    PathProgressId, PathStatus, StepId, StepProgress, TenantId, UserId,
};
use std::sync::Arc;
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness or referential constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Course catalog records, owned by the course subsystem and read by the path engine.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the owning course does not exist.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError>;
}

//
// ─── TRANSACTIONAL ACCESS ──────────────────────────────────────────────────────
//

/// Entry point for every progress, enrollment and path mutation.
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Open a transaction. Dropping the returned handle without calling
    /// `PathTx::commit` rolls every write back.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the transaction cannot be opened.
    async fn begin(&self) -> Result<Box<dyn PathTx>, StorageError>;

    /// Open a transaction that only reads. Backends may skip taking the
    /// write lock; writing through it is not supported.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the transaction cannot be opened.
    async fn begin_read(&self) -> Result<Box<dyn PathTx>, StorageError> {
        self.begin().await
    }
}

/// Catalog lookups available inside a transaction.
#[async_trait]
pub trait CatalogQueries: Send {
    async fn get_course(&mut self, id: CourseId) -> Result<Option<Course>, StorageError>;
    async fn get_module(&mut self, id: ModuleId) -> Result<Option<Module>, StorageError>;
}

/// Learning paths and their steps.
#[async_trait]
pub trait PathQueries: Send {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the slug is taken.
    async fn insert_path(&mut self, path: NewPath) -> Result<LearningPath, StorageError>;
    async fn get_path(&mut self, id: PathId) -> Result<Option<LearningPath>, StorageError>;
    async fn slug_exists(&mut self, slug: &str) -> Result<bool, StorageError>;
    async fn list_paths(&mut self, tenant: TenantId) -> Result<Vec<LearningPath>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the path does not exist.
    async fn set_path_status(&mut self, id: PathId, status: PathStatus)
    -> Result<(), StorageError>;

    /// Delete a path together with its steps and all progress on it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the path does not exist.
    async fn delete_path(&mut self, id: PathId) -> Result<(), StorageError>;

    /// Steps of a path ordered by `order` ascending.
    async fn steps_for_path(&mut self, path: PathId)
    -> Result<Vec<LearningPathStep>, StorageError>;
    async fn get_step(&mut self, id: StepId) -> Result<Option<LearningPathStep>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `(path, order)` is taken or the path is missing.
    async fn insert_step(&mut self, step: NewStep) -> Result<LearningPathStep, StorageError>;

    /// Persist content and `is_required` changes. The order is left alone.
    async fn update_step(&mut self, step: &LearningPathStep) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another step of the path holds `order`.
    async fn set_step_order(&mut self, id: StepId, order: u32) -> Result<(), StorageError>;

    /// Delete a step and the step progress that points at it.
    async fn delete_step(&mut self, id: StepId) -> Result<(), StorageError>;

    /// Steps that point directly at `course` in paths of `tenant`, optionally
    /// restricted to paths in `status`. Ordered by path, then step order.
    async fn course_steps_in_tenant(
        &mut self,
        course: CourseId,
        tenant: TenantId,
        status: Option<PathStatus>,
    ) -> Result<Vec<LearningPathStep>, StorageError>;
}

/// Course enrollments.
#[async_trait]
pub trait EnrollmentQueries: Send {
    async fn get_enrollment(&mut self, id: EnrollmentId)
    -> Result<Option<Enrollment>, StorageError>;
    async fn find_enrollment(
        &mut self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `(user, course)` already has an enrollment.
    async fn insert_enrollment(
        &mut self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, StorageError>;

    /// Persist status and `completed_at`.
    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StorageError>;
}

/// Path-level and step-level progress records.
#[async_trait]
pub trait ProgressQueries: Send {
    async fn get_path_progress(
        &mut self,
        id: PathProgressId,
    ) -> Result<Option<PathProgress>, StorageError>;
    async fn find_path_progress(
        &mut self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<PathProgress>, StorageError>;
    async fn list_path_progress(&mut self, user: UserId)
    -> Result<Vec<PathProgress>, StorageError>;

    /// Every user's progress on `path`, ordered by id.
    async fn path_progress_for_path(
        &mut self,
        path: PathId,
    ) -> Result<Vec<PathProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `(user, path)` already has progress.
    async fn insert_path_progress(
        &mut self,
        progress: NewPathProgress,
    ) -> Result<PathProgress, StorageError>;
    async fn update_path_progress(&mut self, progress: &PathProgress) -> Result<(), StorageError>;

    /// Step progress rows owned by a path progress record.
    async fn step_progress_for(
        &mut self,
        progress: PathProgressId,
    ) -> Result<Vec<StepProgress>, StorageError>;
    async fn find_step_progress(
        &mut self,
        user: UserId,
        step: StepId,
    ) -> Result<Option<StepProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `(user, step)` already has progress.
    async fn insert_step_progress(
        &mut self,
        progress: NewStepProgress,
    ) -> Result<StepProgress, StorageError>;
    async fn update_step_progress(&mut self, progress: &StepProgress) -> Result<(), StorageError>;
}

/// A single open transaction across every relation the path engine touches.
#[async_trait]
pub trait PathTx: CatalogQueries + PathQueries + EnrollmentQueries + ProgressQueries {
    /// # Errors
    ///
    /// Returns `StorageError` if the commit fails; nothing is persisted then.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discard every write made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails to roll back.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub paths: Arc<dyn PathStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let paths: Arc<dyn PathStore> = Arc::new(repo);
        Self { catalog, paths }
    }
}
