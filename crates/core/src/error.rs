use thiserror::Error;

use crate::model::{ContentRef, StepId, TenantId};

/// Input rejected before any state is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("expected {expected} step ids, got {actual}")]
    StepCountMismatch { expected: usize, actual: usize },

    #[error("invalid or duplicate step ids for this path (unknown: {unknown:?}, duplicates: {duplicates:?})")]
    InvalidStepIds {
        unknown: Vec<StepId>,
        duplicates: Vec<StepId>,
    },

    #[error("{0} not found")]
    ContentNotFound(ContentRef),

    #[error("{content} belongs to a different tenant (expected tenant {expected})")]
    ContentWrongTenant {
        content: ContentRef,
        expected: TenantId,
    },

    #[error("unknown content kind: {0}")]
    UnknownContentKind(String),

    #[error("unknown content type id: {0}")]
    UnknownContentTypeId(u64),

    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("invalid status: {0}")]
    InvalidStatus(String),
}

/// Explicit progress transition requested from a state that does not allow it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressStateError {
    #[error("only an in-progress path can be paused (current status: {0})")]
    NotInProgress(&'static str),

    #[error("only a paused path can be resumed (current status: {0})")]
    NotPaused(&'static str),
}
