use super::{
    extracted_id, find_by_slug, load_resource, EXISTS_IN_DATABASE, RESOURCE_ID, SHOULD_CREATE,
    TARGET_RESOURCE,
};
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::kind::require_kind;
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::{ApiResource, ResourceId, ResourceReference};
use crate::store::ResourceStore;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Loads the stored version of the resource being updated into `existing`.
///
/// Looks up by id; when the caller sent no id, falls back to the slug within the owner scope
/// and writes the found id back onto the working state.
pub struct LoadExistingStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> LoadExistingStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for LoadExistingStep<R> {
    fn name(&self) -> &'static str {
        "LoadExisting"
    }

    fn contract(&self) -> StepContract {
        StepContract::fills(&[Slot::Existing])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        // The working state carries the resolved slug; the input is the fallback.
        let meta = ctx.new_state().unwrap_or(ctx.input()).metadata().clone();

        let existing: R = if !meta.id.is_empty() {
            load_resource(ctx.call(), self.store.as_ref(), kind, &meta.id).await?
        } else if !meta.slug.is_empty() {
            let mut matches: Vec<R> =
                find_by_slug(ctx.call(), self.store.as_ref(), kind, &meta.owner_scope, &meta.slug)
                    .await?;
            match matches.len() {
                0 => return Err(PipelineError::not_found(kind, meta.slug)),
                1 => matches.remove(0),
                n => {
                    return Err(PipelineError::internal(format!(
                        "{n} {kind} resources share slug '{}' in scope {}",
                        meta.slug, meta.owner_scope
                    )))
                }
            }
        } else {
            return Err(PipelineError::invalid(
                "metadata.id or metadata.slug is required",
            ));
        };

        if meta.id.is_empty() {
            let id = existing.id().to_string();
            if let Ok(state) = ctx.new_state_mut() {
                state.metadata_mut().id = id;
            }
        }

        debug!(kind, id = existing.id(), "Loaded existing");
        ctx.set_existing(existing);
        Ok(())
    }
}

/// Loads the resource named by a [`ResourceId`] input into [`TARGET_RESOURCE`].
pub struct LoadTargetStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> LoadTargetStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<ResourceId> for LoadTargetStep<R> {
    fn name(&self) -> &'static str {
        "LoadTarget"
    }

    async fn execute(&self, ctx: &mut RequestContext<ResourceId>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let id = if ctx.contains(RESOURCE_ID) {
            extracted_id(ctx)?
        } else {
            ctx.input().value.trim().to_string()
        };
        if id.is_empty() {
            return Err(PipelineError::invalid("resource id is required"));
        }

        let target: R = load_resource(ctx.call(), self.store.as_ref(), kind, &id).await?;
        ctx.set(TARGET_RESOURCE, target);
        Ok(())
    }
}

/// Loads the single resource addressed by a [`ResourceReference`] into [`TARGET_RESOURCE`].
pub struct LoadByReferenceStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> LoadByReferenceStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<ResourceReference> for LoadByReferenceStep<R> {
    fn name(&self) -> &'static str {
        "LoadByReference"
    }

    async fn execute(
        &self,
        ctx: &mut RequestContext<ResourceReference>,
    ) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?;
        let reference = ctx.input();
        if reference.slug.trim().is_empty() {
            return Err(PipelineError::invalid("reference slug is required"));
        }
        if let Some(requested) = reference.kind {
            if requested != kind {
                return Err(PipelineError::invalid(format!(
                    "reference kind {requested} does not match {kind}"
                )));
            }
        }

        let scope = reference.owner_scope();
        let mut matches: Vec<R> = find_by_slug(
            ctx.call(),
            self.store.as_ref(),
            kind.name(),
            &scope,
            &reference.slug,
        )
        .await?;

        let target = match matches.len() {
            0 => return Err(PipelineError::not_found(kind.name(), reference.slug.clone())),
            1 => matches.remove(0),
            n => {
                return Err(PipelineError::internal(format!(
                    "{n} {kind} resources share slug '{}' in scope {scope}",
                    reference.slug
                )))
            }
        };
        ctx.set(TARGET_RESOURCE, target);
        Ok(())
    }
}

/// Decides whether apply creates or updates. Never fails on absence.
///
/// Records [`EXISTS_IN_DATABASE`] and [`SHOULD_CREATE`]. When a resource with the same natural
/// key exists, it becomes `existing` and its id is copied onto the working state.
pub struct LoadForApplyStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> LoadForApplyStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for LoadForApplyStep<R> {
    fn name(&self) -> &'static str {
        "LoadForApply"
    }

    fn contract(&self) -> StepContract {
        // `existing` is only filled when a match is found, so it is not advertised.
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let meta = ctx.new_state()?.metadata().clone();

        let mut matches: Vec<R> =
            find_by_slug(ctx.call(), self.store.as_ref(), kind, &meta.owner_scope, &meta.slug)
                .await?;

        let existing = match matches.len() {
            0 => None,
            1 => Some(matches.remove(0)),
            n => {
                return Err(PipelineError::internal(format!(
                    "{n} {kind} resources share slug '{}' in scope {}",
                    meta.slug, meta.owner_scope
                )))
            }
        };

        let exists = existing.is_some();
        ctx.set(EXISTS_IN_DATABASE, exists);
        ctx.set(SHOULD_CREATE, !exists);

        if let Some(existing) = existing {
            let id = existing.id().to_string();
            ctx.new_state_mut()?.metadata_mut().id = id;
            ctx.set_existing(existing);
        }
        debug!(kind, slug = %meta.slug, exists, "Resolved apply target");
        Ok(())
    }
}
