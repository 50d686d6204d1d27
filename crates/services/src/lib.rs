#![forbid(unsafe_code)]

pub mod app_services;
pub mod enrollment_service;
pub mod error;
pub mod paths;

pub use lms_core::Clock;

pub use app_services::LmsServices;
pub use enrollment_service::{EnrollmentService, EnrollmentTransition};
pub use error::{
    AppServicesError, EnrollmentServiceError, NotFound, PathServiceError, ProgressServiceError,
};
pub use paths::{
    PathAuthoringService, PathEnrollment, PathEnrollmentService, ProgressReport, ProgressService,
    ProgressSyncService, StepUpdate,
};
