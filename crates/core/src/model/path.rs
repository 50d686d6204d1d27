use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::content_ref::ContentRef;
use crate::model::ids::{PathId, StepId, TenantId};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PathStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PathStatus::Draft => "DRAFT",
            PathStatus::Published => "PUBLISHED",
            PathStatus::Archived => "ARCHIVED",
        }
    }
}

impl FromStr for PathStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PathStatus::Draft),
            "PUBLISHED" => Ok(PathStatus::Published),
            "ARCHIVED" => Ok(PathStatus::Archived),
            _ => Err(ValidationError::InvalidStatus(s.to_owned())),
        }
    }
}

//
// ─── PATH ──────────────────────────────────────────────────────────────────────
//

/// A curated, tenant-scoped sequence of learning items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: PathId,
    pub tenant_id: TenantId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub status: PathStatus,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a path that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPath {
    pub tenant_id: TenantId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub status: PathStatus,
    pub created_at: DateTime<Utc>,
}

impl NewPath {
    /// Build a new path with its base slug; uniqueness is settled at insert time.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyTitle` if the title is blank.
    pub fn new(
        tenant_id: TenantId,
        title: impl Into<String>,
        description: impl Into<String>,
        status: PathStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self {
            tenant_id,
            slug: slugify(&title),
            title,
            description: description.into(),
            status,
            created_at,
        })
    }

    #[must_use]
    pub fn into_path(self, id: PathId) -> LearningPath {
        LearningPath {
            id,
            tenant_id: self.tenant_id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else collapsed to `-`.
#[must_use]
pub fn slugify(source: &str) -> String {
    let mut slug = String::with_capacity(source.len());
    let mut pending_dash = false;
    for ch in source.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch == '_' || ch == '-' || ch.is_whitespace() || ch.is_ascii_punctuation() {
            pending_dash = true;
        }
    }
    slug
}

/// Candidate slugs in the order they are tried: `base`, `base-1`, `base-2`, ...
///
/// An empty base falls back to a short random token.
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> {
    let base = if base.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()[..8].to_owned()
    } else {
        base.to_owned()
    };
    std::iter::once(base.clone()).chain((1u32..).map(move |n| format!("{base}-{n}")))
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// One element of a path. `order` is 1-based and dense within the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPathStep {
    pub id: StepId,
    pub path_id: PathId,
    pub order: u32,
    pub content: ContentRef,
    pub is_required: bool,
}

/// Step that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub path_id: PathId,
    pub order: u32,
    pub content: ContentRef,
    pub is_required: bool,
}

impl NewStep {
    #[must_use]
    pub fn into_step(self, id: StepId) -> LearningPathStep {
        LearningPathStep {
            id,
            path_id: self.path_id,
            order: self.order,
            content: self.content,
            is_required: self.is_required,
        }
    }
}

/// Order for a step appended to the end of `steps`.
#[must_use]
pub fn next_step_order(steps: &[LearningPathStep]) -> u32 {
    steps.iter().map(|s| s.order).max().unwrap_or(0) + 1
}
