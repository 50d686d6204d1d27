use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::model::ids::{CourseId, ModuleId, TenantId};

//
// ─── CONTENT KIND ──────────────────────────────────────────────────────────────
//

/// Kind of learning item a path step can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Course,
    Module,
}

impl ContentKind {
    /// Stable numeric content-type id accepted by `ContentKindInput::ById`.
    #[must_use]
    pub const fn type_id(self) -> u64 {
        match self {
            ContentKind::Course => 1,
            ContentKind::Module => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentKind::Course => "course",
            ContentKind::Module => "module",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownContentKind` for anything but `course` or `module`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "course" => Ok(ContentKind::Course),
            "module" => Ok(ContentKind::Module),
            _ => Err(ValidationError::UnknownContentKind(raw.to_owned())),
        }
    }

    /// Map a numeric content-type id back to a kind.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownContentTypeId` for ids other than 1 and 2.
    pub fn from_type_id(id: u64) -> Result<Self, ValidationError> {
        match id {
            1 => Ok(ContentKind::Course),
            2 => Ok(ContentKind::Module),
            other => Err(ValidationError::UnknownContentTypeId(other)),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CONTENT REFERENCE ─────────────────────────────────────────────────────────
//

/// What a path step points at: a whole course or a module inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    Course(CourseId),
    Module(ModuleId),
}

impl ContentRef {
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        match self {
            ContentRef::Course(_) => ContentKind::Course,
            ContentRef::Module(_) => ContentKind::Module,
        }
    }

    #[must_use]
    pub const fn object_id(&self) -> u64 {
        match self {
            ContentRef::Course(id) => id.value(),
            ContentRef::Module(id) => id.value(),
        }
    }

    #[must_use]
    pub const fn from_parts(kind: ContentKind, object_id: u64) -> Self {
        match kind {
            ContentKind::Course => ContentRef::Course(CourseId::new(object_id)),
            ContentKind::Module => ContentRef::Module(ModuleId::new(object_id)),
        }
    }

    /// The course id when this reference points at a course directly.
    #[must_use]
    pub const fn direct_course(&self) -> Option<CourseId> {
        match self {
            ContentRef::Course(id) => Some(*id),
            ContentRef::Module(_) => None,
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.object_id())
    }
}

/// Common view over a resolved course or module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContent {
    pub reference: ContentRef,
    pub tenant_id: TenantId,
    /// The course itself, or the module's owning course.
    pub course_id: CourseId,
    pub title: String,
}

//
// ─── AUTHORING INPUT ───────────────────────────────────────────────────────────
//

/// How an author names the kind of content when creating or editing a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKindInput {
    ByKind(String),
    ById(u64),
}

impl ContentKindInput {
    /// Resolve the input into a `ContentKind`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for unknown names or ids.
    pub fn resolve(&self) -> Result<ContentKind, ValidationError> {
        match self {
            ContentKindInput::ByKind(name) => ContentKind::parse(name),
            ContentKindInput::ById(id) => ContentKind::from_type_id(*id),
        }
    }
}

/// Raw step content as received at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContentInput {
    pub kind: ContentKindInput,
    pub object_id: u64,
}

impl StepContentInput {
    #[must_use]
    pub fn course(id: CourseId) -> Self {
        Self {
            kind: ContentKindInput::ByKind("course".into()),
            object_id: id.value(),
        }
    }

    #[must_use]
    pub fn module(id: ModuleId) -> Self {
        Self {
            kind: ContentKindInput::ByKind("module".into()),
            object_id: id.value(),
        }
    }

    /// Resolve into the internal tagged reference.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the kind cannot be resolved.
    pub fn into_ref(self) -> Result<ContentRef, ValidationError> {
        let kind = self.kind.resolve()?;
        Ok(ContentRef::from_parts(kind, self.object_id))
    }
}
