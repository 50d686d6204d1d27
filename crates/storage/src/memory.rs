use async_trait::async_trait;
use lms_core::model::{
    ContentRef, Course, CourseId, Enrollment, EnrollmentId, LearningPath, LearningPathStep, Module,
    ModuleId, NewEnrollment, NewPath, NewPathProgress, NewStep, NewStepProgress, PathId,
    PathProgress, PathProgressId, PathStatus, StepId, StepProgress, StepProgressId, TenantId,
    UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::repository::{
    CatalogQueries, CatalogRepository, EnrollmentQueries, PathQueries, PathStore, PathTx,
    ProgressQueries, StorageError,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    path: u64,
    step: u64,
    enrollment: u64,
    path_progress: u64,
    step_progress: u64,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    seq: Sequences,
    courses: BTreeMap<CourseId, Course>,
    modules: BTreeMap<ModuleId, Module>,
    paths: BTreeMap<PathId, LearningPath>,
    steps: BTreeMap<StepId, LearningPathStep>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    path_progress: BTreeMap<PathProgressId, PathProgress>,
    step_progress: BTreeMap<StepProgressId, StepProgress>,
}

impl MemoryState {
    fn order_taken(&self, path: PathId, order: u32, except: Option<StepId>) -> bool {
        self.steps
            .values()
            .any(|s| s.path_id == path && s.order == order && Some(s.id) != except)
    }

    fn drop_step_progress_where(&mut self, pred: impl Fn(&StepProgress) -> bool) {
        self.step_progress.retain(|_, row| !pred(row));
    }
}

/// In-memory repository for tests and prototyping.
///
/// A transaction holds the state lock for its whole lifetime and works on a
/// copy, so concurrent transactions are serialized and an uncommitted
/// transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.state.lock().await;
        guard.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = self.state.lock().await;
        if !guard.courses.contains_key(&module.course_id) {
            return Err(StorageError::Conflict(format!(
                "module {} references missing course {}",
                module.id, module.course_id
            )));
        }
        guard.modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.state.lock().await.courses.get(&id).cloned())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        Ok(self.state.lock().await.modules.get(&id).cloned())
    }
}

#[async_trait]
impl PathStore for InMemoryRepository {
    async fn begin(&self) -> Result<Box<dyn PathTx>, StorageError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

/// Open in-memory transaction.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl PathTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogQueries for MemoryTx {
    async fn get_course(&mut self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.work.courses.get(&id).cloned())
    }

    async fn get_module(&mut self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        Ok(self.work.modules.get(&id).cloned())
    }
}

#[async_trait]
impl PathQueries for MemoryTx {
    async fn insert_path(&mut self, path: NewPath) -> Result<LearningPath, StorageError> {
        if self.work.paths.values().any(|p| p.slug == path.slug) {
            return Err(StorageError::Conflict(format!("slug {} taken", path.slug)));
        }
        let id = PathId::new(bump(&mut self.work.seq.path));
        let path = path.into_path(id);
        self.work.paths.insert(id, path.clone());
        Ok(path)
    }

    async fn get_path(&mut self, id: PathId) -> Result<Option<LearningPath>, StorageError> {
        Ok(self.work.paths.get(&id).cloned())
    }

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, StorageError> {
        Ok(self.work.paths.values().any(|p| p.slug == slug))
    }

    async fn list_paths(&mut self, tenant: TenantId) -> Result<Vec<LearningPath>, StorageError> {
        let mut paths: Vec<LearningPath> = self
            .work
            .paths
            .values()
            .filter(|p| p.tenant_id == tenant)
            .cloned()
            .collect();
        paths.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(paths)
    }

    async fn set_path_status(
        &mut self,
        id: PathId,
        status: PathStatus,
    ) -> Result<(), StorageError> {
        let path = self.work.paths.get_mut(&id).ok_or(StorageError::NotFound)?;
        path.status = status;
        Ok(())
    }

    async fn delete_path(&mut self, id: PathId) -> Result<(), StorageError> {
        if self.work.paths.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        self.work.steps.retain(|_, s| s.path_id != id);
        let progress_ids: Vec<PathProgressId> = self
            .work
            .path_progress
            .values()
            .filter(|p| p.path_id == id)
            .map(|p| p.id)
            .collect();
        self.work.path_progress.retain(|_, p| p.path_id != id);
        self.work
            .drop_step_progress_where(|row| progress_ids.contains(&row.path_progress_id));
        Ok(())
    }

    async fn steps_for_path(
        &mut self,
        path: PathId,
    ) -> Result<Vec<LearningPathStep>, StorageError> {
        let mut steps: Vec<LearningPathStep> = self
            .work
            .steps
            .values()
            .filter(|s| s.path_id == path)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    async fn get_step(&mut self, id: StepId) -> Result<Option<LearningPathStep>, StorageError> {
        Ok(self.work.steps.get(&id).cloned())
    }

    async fn insert_step(&mut self, step: NewStep) -> Result<LearningPathStep, StorageError> {
        if !self.work.paths.contains_key(&step.path_id) {
            return Err(StorageError::Conflict(format!(
                "step references missing path {}",
                step.path_id
            )));
        }
        if self.work.order_taken(step.path_id, step.order, None) {
            return Err(StorageError::Conflict(format!(
                "order {} taken in path {}",
                step.order, step.path_id
            )));
        }
        let id = StepId::new(bump(&mut self.work.seq.step));
        let step = step.into_step(id);
        self.work.steps.insert(id, step.clone());
        Ok(step)
    }

    async fn update_step(&mut self, step: &LearningPathStep) -> Result<(), StorageError> {
        let existing = self
            .work
            .steps
            .get_mut(&step.id)
            .ok_or(StorageError::NotFound)?;
        existing.content = step.content;
        existing.is_required = step.is_required;
        Ok(())
    }

    async fn set_step_order(&mut self, id: StepId, order: u32) -> Result<(), StorageError> {
        let path_id = self
            .work
            .steps
            .get(&id)
            .map(|s| s.path_id)
            .ok_or(StorageError::NotFound)?;
        if self.work.order_taken(path_id, order, Some(id)) {
            return Err(StorageError::Conflict(format!(
                "order {order} taken in path {path_id}"
            )));
        }
        if let Some(step) = self.work.steps.get_mut(&id) {
            step.order = order;
        }
        Ok(())
    }

    async fn delete_step(&mut self, id: StepId) -> Result<(), StorageError> {
        if self.work.steps.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        self.work.drop_step_progress_where(|row| row.step_id == id);
        Ok(())
    }

    async fn course_steps_in_tenant(
        &mut self,
        course: CourseId,
        tenant: TenantId,
        status: Option<PathStatus>,
    ) -> Result<Vec<LearningPathStep>, StorageError> {
        let paths = &self.work.paths;
        let mut steps: Vec<LearningPathStep> = self
            .work
            .steps
            .values()
            .filter(|s| s.content == ContentRef::Course(course))
            .filter(|s| {
                paths.get(&s.path_id).is_some_and(|p| {
                    p.tenant_id == tenant && status.is_none_or(|wanted| p.status == wanted)
                })
            })
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.path_id, s.order));
        Ok(steps)
    }
}

#[async_trait]
impl EnrollmentQueries for MemoryTx {
    async fn get_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(self.work.enrollments.get(&id).cloned())
    }

    async fn find_enrollment(
        &mut self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(self
            .work
            .enrollments
            .values()
            .find(|e| e.user_id == user && e.course_id == course)
            .cloned())
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, StorageError> {
        if !self.work.courses.contains_key(&enrollment.course_id) {
            return Err(StorageError::Conflict(format!(
                "enrollment references missing course {}",
                enrollment.course_id
            )));
        }
        let duplicate = self
            .work
            .enrollments
            .values()
            .any(|e| e.user_id == enrollment.user_id && e.course_id == enrollment.course_id);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "user {} already enrolled in course {}",
                enrollment.user_id, enrollment.course_id
            )));
        }
        let id = EnrollmentId::new(bump(&mut self.work.seq.enrollment));
        let enrollment = enrollment.into_enrollment(id);
        self.work.enrollments.insert(id, enrollment.clone());
        Ok(enrollment)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let existing = self
            .work
            .enrollments
            .get_mut(&enrollment.id)
            .ok_or(StorageError::NotFound)?;
        existing.status = enrollment.status;
        existing.completed_at = enrollment.completed_at;
        Ok(())
    }
}

#[async_trait]
impl ProgressQueries for MemoryTx {
    async fn get_path_progress(
        &mut self,
        id: PathProgressId,
    ) -> Result<Option<PathProgress>, StorageError> {
        Ok(self.work.path_progress.get(&id).cloned())
    }

    async fn find_path_progress(
        &mut self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<PathProgress>, StorageError> {
        Ok(self
            .work
            .path_progress
            .values()
            .find(|p| p.user_id == user && p.path_id == path)
            .cloned())
    }

    async fn list_path_progress(
        &mut self,
        user: UserId,
    ) -> Result<Vec<PathProgress>, StorageError> {
        Ok(self
            .work
            .path_progress
            .values()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect())
    }

    async fn path_progress_for_path(
        &mut self,
        path: PathId,
    ) -> Result<Vec<PathProgress>, StorageError> {
        Ok(self
            .work
            .path_progress
            .values()
            .filter(|p| p.path_id == path)
            .cloned()
            .collect())
    }

    async fn insert_path_progress(
        &mut self,
        progress: NewPathProgress,
    ) -> Result<PathProgress, StorageError> {
        if !self.work.paths.contains_key(&progress.path_id) {
            return Err(StorageError::Conflict(format!(
                "progress references missing path {}",
                progress.path_id
            )));
        }
        let duplicate = self
            .work
            .path_progress
            .values()
            .any(|p| p.user_id == progress.user_id && p.path_id == progress.path_id);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "user {} already has progress on path {}",
                progress.user_id, progress.path_id
            )));
        }
        let id = PathProgressId::new(bump(&mut self.work.seq.path_progress));
        let progress = progress.into_progress(id);
        self.work.path_progress.insert(id, progress.clone());
        Ok(progress)
    }

    async fn update_path_progress(&mut self, progress: &PathProgress) -> Result<(), StorageError> {
        let existing = self
            .work
            .path_progress
            .get_mut(&progress.id)
            .ok_or(StorageError::NotFound)?;
        existing.status = progress.status;
        existing.started_at = progress.started_at;
        existing.completed_at = progress.completed_at;
        existing.current_step_order = progress.current_step_order;
        Ok(())
    }

    async fn step_progress_for(
        &mut self,
        progress: PathProgressId,
    ) -> Result<Vec<StepProgress>, StorageError> {
        Ok(self
            .work
            .step_progress
            .values()
            .filter(|row| row.path_progress_id == progress)
            .cloned()
            .collect())
    }

    async fn find_step_progress(
        &mut self,
        user: UserId,
        step: StepId,
    ) -> Result<Option<StepProgress>, StorageError> {
        Ok(self
            .work
            .step_progress
            .values()
            .find(|row| row.user_id == user && row.step_id == step)
            .cloned())
    }

    async fn insert_step_progress(
        &mut self,
        progress: NewStepProgress,
    ) -> Result<StepProgress, StorageError> {
        if !self.work.path_progress.contains_key(&progress.path_progress_id)
            || !self.work.steps.contains_key(&progress.step_id)
        {
            return Err(StorageError::Conflict(
                "step progress references missing parent".into(),
            ));
        }
        let duplicate = self
            .work
            .step_progress
            .values()
            .any(|row| row.user_id == progress.user_id && row.step_id == progress.step_id);
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "user {} already has progress on step {}",
                progress.user_id, progress.step_id
            )));
        }
        let id = StepProgressId::new(bump(&mut self.work.seq.step_progress));
        let row = progress.into_step_progress(id);
        self.work.step_progress.insert(id, row.clone());
        Ok(row)
    }

    async fn update_step_progress(&mut self, progress: &StepProgress) -> Result<(), StorageError> {
        let existing = self
            .work
            .step_progress
            .get_mut(&progress.id)
            .ok_or(StorageError::NotFound)?;
        existing.status = progress.status;
        existing.started_at = progress.started_at;
        existing.completed_at = progress.completed_at;
        Ok(())
    }
}
