//! Standard pipelines shared by every controller.
//!
//! Write pipelines come back as builders so a controller can append its own steps before
//! building. Query and delete pipelines are complete as they are.

use resource_pipeline::steps::{
    BuildNewStateStep, BuildUpdateStateStep, CheckDuplicateStep, DeleteResourceStep,
    ExtractResourceIdStep, LoadByReferenceStep, LoadExistingForDeleteStep, LoadExistingStep,
    LoadForApplyStep, LoadTargetStep, PersistStep, ResolveSlugStep, ValidateStep,
    EXISTING_RESOURCE, SHOULD_CREATE, TARGET_RESOURCE,
};
use resource_pipeline::store::ResourceStore;
use resource_pipeline::{
    ApiResource, CallContext, Pipeline, PipelineBuilder, PipelineError, RequestContext,
    ResourceController, ResourceId, ResourceReference,
};
use std::sync::Arc;
use tracing::debug;

/// Validate, ResolveSlug, CheckDuplicate, BuildNewState, Persist.
pub fn create<R: ApiResource>(prefix: &str, store: &Arc<dyn ResourceStore>) -> PipelineBuilder<R> {
    PipelineBuilder::new(format!("{prefix}.create"))
        .seed_from_input()
        .add_step(ValidateStep::new())
        .add_step(ResolveSlugStep::new())
        .add_step(CheckDuplicateStep::new(store.clone()))
        .add_step(BuildNewStateStep::new())
        .add_step(PersistStep::new(store.clone()))
}

/// Validate, ResolveSlug, LoadExisting, BuildUpdateState, Persist.
pub fn update<R: ApiResource>(prefix: &str, store: &Arc<dyn ResourceStore>) -> PipelineBuilder<R> {
    PipelineBuilder::new(format!("{prefix}.update"))
        .seed_from_input()
        .add_step(ValidateStep::new())
        .add_step(ResolveSlugStep::new())
        .add_step(LoadExistingStep::new(store.clone()))
        .add_step(BuildUpdateStateStep::new())
        .add_step(PersistStep::new(store.clone()))
}

/// Validate, ResolveSlug, LoadForApply. The controller then delegates with [`apply`].
pub fn apply_lookup<R: ApiResource>(
    prefix: &str,
    store: &Arc<dyn ResourceStore>,
) -> Result<Pipeline<R>, PipelineError> {
    PipelineBuilder::new(format!("{prefix}.apply"))
        .seed_from_input()
        .add_step(ValidateStep::new())
        .add_step(ResolveSlugStep::new())
        .add_step(LoadForApplyStep::new(store.clone()))
        .build()
}

pub fn get<R: ApiResource>(
    prefix: &str,
    store: &Arc<dyn ResourceStore>,
) -> Result<Pipeline<ResourceId>, PipelineError> {
    PipelineBuilder::new(format!("{prefix}.get"))
        .add_step(LoadTargetStep::<R>::new(store.clone()))
        .build()
}

pub fn get_by_reference<R: ApiResource>(
    prefix: &str,
    store: &Arc<dyn ResourceStore>,
) -> Result<Pipeline<ResourceReference>, PipelineError> {
    PipelineBuilder::new(format!("{prefix}.get_by_reference"))
        .add_step(LoadByReferenceStep::<R>::new(store.clone()))
        .build()
}

/// ExtractResourceId, LoadExistingForDelete, DeleteResource.
pub fn delete<R: ApiResource>(
    prefix: &str,
    store: &Arc<dyn ResourceStore>,
) -> Result<Pipeline<ResourceId>, PipelineError> {
    PipelineBuilder::new(format!("{prefix}.delete"))
        .add_step(ExtractResourceIdStep)
        .add_step(LoadExistingForDeleteStep::<R>::new(store.clone()))
        .add_step(DeleteResourceStep::new(store.clone()))
        .build()
}

/// Runs a write pipeline and returns the state it persisted.
pub async fn write<R: ApiResource>(
    pipeline: &Pipeline<R>,
    call: CallContext,
    input: R,
) -> Result<R, PipelineError> {
    let mut ctx = RequestContext::new(call, input);
    pipeline.execute(&mut ctx).await?;
    ctx.into_new_state()
}

/// Runs a get or get-by-reference pipeline and returns the loaded resource.
pub async fn query<R: ApiResource, I: Clone + Send + Sync + 'static>(
    pipeline: &Pipeline<I>,
    call: CallContext,
    input: I,
) -> Result<R, PipelineError> {
    let mut ctx = RequestContext::new(call, input);
    pipeline.execute(&mut ctx).await?;
    ctx.take(TARGET_RESOURCE)
        .ok_or(PipelineError::StateNotSet(TARGET_RESOURCE))
}

/// Runs a delete pipeline and returns the resource as it was before deletion.
pub async fn remove<R: ApiResource>(
    pipeline: &Pipeline<ResourceId>,
    call: CallContext,
    id: ResourceId,
) -> Result<R, PipelineError> {
    let mut ctx = RequestContext::new(call, id);
    pipeline.execute(&mut ctx).await?;
    ctx.take(EXISTING_RESOURCE)
        .ok_or(PipelineError::StateNotSet(EXISTING_RESOURCE))
}

/// Runs the apply lookup, then hands the resolved state to the controller's own create or
/// update. Either way the full pipeline of that operation runs.
pub async fn apply<R, C>(
    controller: &C,
    lookup: &Pipeline<R>,
    call: CallContext,
    resource: R,
) -> Result<R, PipelineError>
where
    R: ApiResource,
    C: ResourceController<R> + ?Sized,
{
    let mut ctx = RequestContext::new(call.clone(), resource);
    lookup.execute(&mut ctx).await?;
    let should_create = ctx.get::<bool>(SHOULD_CREATE).copied().unwrap_or(true);
    let resolved = ctx.into_new_state()?;

    debug!(pipeline = lookup.name(), should_create, "Delegating apply");
    if should_create {
        controller.create(call, resolved).await
    } else {
        controller.update(call, resolved).await
    }
}
