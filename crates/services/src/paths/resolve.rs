use lms_core::ValidationError;
use lms_core::model::{ContentRef, CourseId, ResolvedContent, TenantId};
use storage::repository::{CatalogQueries, PathTx, StorageError};
use tracing::warn;

use crate::error::PathServiceError;

/// Resolve a content reference to its course or module view.
///
/// `Ok(None)` means the reference dangles: the item, or a module's owning course, is gone.
pub(crate) async fn resolve_content(
    tx: &mut dyn PathTx,
    content: ContentRef,
) -> Result<Option<ResolvedContent>, StorageError> {
    match content {
        ContentRef::Course(id) => Ok(tx.get_course(id).await?.map(|c| c.resolved())),
        ContentRef::Module(id) => {
            let Some(module) = tx.get_module(id).await? else {
                return Ok(None);
            };
            let course = tx.get_course(module.course_id).await?;
            Ok(course.map(|c| module.resolved(&c)))
        }
    }
}

/// The course a step's content belongs to, or `None` with a warning when it dangles.
pub(crate) async fn owning_course(
    tx: &mut dyn PathTx,
    content: ContentRef,
) -> Result<Option<CourseId>, StorageError> {
    let resolved = resolve_content(tx, content).await?;
    if resolved.is_none() {
        warn!(%content, "dangling content reference; skipping step");
    }
    Ok(resolved.map(|r| r.course_id))
}

/// Check that `content` exists and belongs to `tenant`.
pub(crate) async fn validate_content(
    tx: &mut dyn PathTx,
    content: ContentRef,
    tenant: TenantId,
) -> Result<ResolvedContent, PathServiceError> {
    let resolved = resolve_content(tx, content)
        .await?
        .ok_or(ValidationError::ContentNotFound(content))?;
    if resolved.tenant_id != tenant {
        return Err(ValidationError::ContentWrongTenant {
            content,
            expected: tenant,
        }
        .into());
    }
    Ok(resolved)
}
