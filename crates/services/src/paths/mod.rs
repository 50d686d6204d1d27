//! Learning-path progress engine: aggregation, sync, cascade enrollment,
//! explicit progress actions and path authoring.

mod aggregator;
mod authoring;
mod cascade;
mod progress;
mod resolve;
mod sync;

pub use authoring::{PathAuthoringService, StepUpdate};
pub use cascade::{PathEnrollment, PathEnrollmentService};
pub use progress::{ProgressReport, ProgressService};
pub use sync::ProgressSyncService;

pub(crate) use aggregator::dispatch;
