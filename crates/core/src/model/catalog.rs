use serde::{Deserialize, Serialize};

use crate::model::content_ref::{ContentRef, ResolvedContent};
use crate::model::ids::{CourseId, ModuleId, TenantId};

/// Course as seen by the path engine. The course catalog owns the full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub tenant_id: TenantId,
    pub title: String,
}

impl Course {
    #[must_use]
    pub fn resolved(&self) -> ResolvedContent {
        ResolvedContent {
            reference: ContentRef::Course(self.id),
            tenant_id: self.tenant_id,
            course_id: self.id,
            title: self.title.clone(),
        }
    }
}

/// Sub-unit of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
}

impl Module {
    /// Resolve the module against its owning course; the tenant comes from the course.
    #[must_use]
    pub fn resolved(&self, course: &Course) -> ResolvedContent {
        ResolvedContent {
            reference: ContentRef::Module(self.id),
            tenant_id: course.tenant_id,
            course_id: course.id,
            title: self.title.clone(),
        }
    }
}
