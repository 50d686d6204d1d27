mod catalog;
mod content_ref;
mod enrollment;
mod ids;
mod path;
mod progress;
mod reorder;

pub use catalog::{Course, Module};
pub use content_ref::{ContentKind, ContentKindInput, ContentRef, ResolvedContent, StepContentInput};
pub use enrollment::{Enrollment, EnrollmentStatus, NewEnrollment};
pub use ids::{
    CourseId, EnrollmentId, ModuleId, ParseIdError, PathId, PathProgressId, StepId,
    StepProgressId, TenantId, UserId,
};
pub use path::{
    LearningPath, LearningPathStep, NewPath, NewStep, PathStatus, next_step_order,
    slug_candidates, slugify,
};
pub use progress::{
    NewPathProgress, NewStepProgress, PathProgress, PathProgressStatus, ProgressTally,
    StepProgress, StepProgressStatus,
};
pub use reorder::{ReorderPlan, STAGING_OFFSET, StepMove};
