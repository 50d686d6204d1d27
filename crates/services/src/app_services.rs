use std::sync::Arc;

use storage::repository::{CatalogRepository, Storage};

use crate::Clock;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::paths::{
    PathAuthoringService, PathEnrollmentService, ProgressService, ProgressSyncService,
};

/// Assembles the services over one storage backend.
#[derive(Clone)]
pub struct LmsServices {
    catalog: Arc<dyn CatalogRepository>,
    authoring: Arc<PathAuthoringService>,
    path_enrollment: Arc<PathEnrollmentService>,
    progress: Arc<ProgressService>,
    sync: Arc<ProgressSyncService>,
    enrollments: Arc<EnrollmentService>,
}

impl LmsServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let store = &storage.paths;
        Self {
            catalog: Arc::clone(&storage.catalog),
            authoring: Arc::new(PathAuthoringService::new(clock, Arc::clone(store))),
            path_enrollment: Arc::new(PathEnrollmentService::new(clock, Arc::clone(store))),
            progress: Arc::new(ProgressService::new(clock, Arc::clone(store))),
            sync: Arc::new(ProgressSyncService::new(clock, Arc::clone(store))),
            enrollments: Arc::new(EnrollmentService::new(clock, Arc::clone(store))),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn CatalogRepository> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn authoring(&self) -> Arc<PathAuthoringService> {
        Arc::clone(&self.authoring)
    }

    #[must_use]
    pub fn path_enrollment(&self) -> Arc<PathEnrollmentService> {
        Arc::clone(&self.path_enrollment)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn sync(&self) -> Arc<ProgressSyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }
}
