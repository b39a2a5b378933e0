//! # Step Catalog
//!
//! Generic steps shared by every resource kind. Controllers assemble them into pipelines and
//! may interleave their own [`Step`](crate::Step) implementations anywhere.
//!
//! | Step | Input | Fills | Fails with |
//! |---|---|---|---|
//! | [`ValidateStep`] | resource | | `InvalidArgument` |
//! | [`ResolveSlugStep`] | resource | slug on `new_state` | `InvalidArgument` when there is no name |
//! | [`CheckDuplicateStep`] | resource | | `AlreadyExists` |
//! | [`BuildNewStateStep`] | resource | `new_state` | |
//! | [`PersistStep`] | resource | | `Internal` |
//! | [`PublishStep`] | resource | | |
//! | [`LoadExistingStep`] | resource | `existing` | `NotFound` |
//! | [`BuildUpdateStateStep`] | resource | `new_state` | |
//! | [`LoadForApplyStep`] | resource | [`EXISTS_IN_DATABASE`], [`SHOULD_CREATE`] | |
//! | [`ExtractResourceIdStep`] | [`ResourceId`] | [`RESOURCE_ID`] | `InvalidArgument` |
//! | [`LoadExistingForDeleteStep`] | [`ResourceId`] | [`EXISTING_RESOURCE`] | `NotFound` |
//! | [`DeleteResourceStep`] | [`ResourceId`] | | `NotFound` |
//! | [`LoadTargetStep`] | [`ResourceId`] | [`TARGET_RESOURCE`] | `NotFound` |
//! | [`LoadByReferenceStep`] | [`ResourceReference`] | [`TARGET_RESOURCE`] | `NotFound`, `Internal` |
//!
//! Steps that touch storage read the storage kind from the call
//! ([`require_kind`](crate::kind::require_kind)) and race their I/O against the call's
//! cancellation and deadline.
//!
//! [`ResourceId`]: crate::resource::ResourceId
//! [`ResourceReference`]: crate::resource::ResourceReference

mod create;
mod delete;
mod load;
mod persist;
mod slug;
mod update;
mod validate;

pub use create::{BuildNewStateStep, CheckDuplicateStep};
pub use delete::{DeleteResourceStep, ExtractResourceIdStep, LoadExistingForDeleteStep};
pub use load::{LoadByReferenceStep, LoadExistingStep, LoadForApplyStep, LoadTargetStep};
pub use persist::{PersistStep, PublishStep};
pub use slug::{slugify, ResolveSlugStep, MAX_SLUG_LEN};
pub use update::BuildUpdateStateStep;
pub use validate::ValidateStep;

use crate::context::{CallContext, RequestContext};
use crate::error::PipelineError;
use crate::resource::{ApiResource, OwnerScope};
use crate::store::{decode, list_resources, ResourceStore};

/// Metadata key: bare id extracted from a [`ResourceId`](crate::resource::ResourceId) input.
pub const RESOURCE_ID: &str = "resource_id";
/// Metadata key: resource loaded before deletion, returned to the caller afterwards.
pub const EXISTING_RESOURCE: &str = "existing_resource";
/// Metadata key: resource loaded by a query pipeline.
pub const TARGET_RESOURCE: &str = "target_resource";
/// Metadata key (`bool`): whether apply found a stored resource.
pub const EXISTS_IN_DATABASE: &str = "exists_in_database";
/// Metadata key (`bool`): whether apply should delegate to create.
pub const SHOULD_CREATE: &str = "should_create";

pub(crate) fn extracted_id<T>(ctx: &RequestContext<T>) -> Result<String, PipelineError> {
    ctx.get::<String>(RESOURCE_ID)
        .cloned()
        .ok_or(PipelineError::StateNotSet(RESOURCE_ID))
}

pub(crate) async fn load_resource<R: ApiResource>(
    call: &CallContext,
    store: &dyn ResourceStore,
    kind: &str,
    id: &str,
) -> Result<R, PipelineError> {
    let bytes = call
        .guard(store.get(kind, id))
        .await?
        .map_err(|e| e.into_pipeline(kind, id))?;
    decode(&bytes).map_err(|e| e.into_pipeline(kind, id))
}

/// Every resource of `kind` whose natural key is `(scope, slug)`.
pub(crate) async fn find_by_slug<R: ApiResource>(
    call: &CallContext,
    store: &dyn ResourceStore,
    kind: &str,
    scope: &OwnerScope,
    slug: &str,
) -> Result<Vec<R>, PipelineError> {
    let resources: Vec<R> = call
        .guard(list_resources(store, kind))
        .await?
        .map_err(|e| PipelineError::internal(format!("failed to list {kind}: {e}")))?;

    Ok(resources
        .into_iter()
        .filter(|r| r.metadata().slug == slug && &r.metadata().owner_scope == scope)
        .collect())
}
