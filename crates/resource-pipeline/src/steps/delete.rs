use super::{extracted_id, load_resource, EXISTING_RESOURCE, RESOURCE_ID};
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::kind::require_kind;
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::{ApiResource, ResourceId};
use crate::store::ResourceStore;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Copies the bare id out of a [`ResourceId`] input into [`RESOURCE_ID`].
#[derive(Debug, Default)]
pub struct ExtractResourceIdStep;

#[async_trait]
impl Step<ResourceId> for ExtractResourceIdStep {
    fn name(&self) -> &'static str {
        "ExtractResourceId"
    }

    fn contract(&self) -> StepContract {
        StepContract::fills(&[Slot::ResourceId])
    }

    async fn execute(&self, ctx: &mut RequestContext<ResourceId>) -> Result<(), PipelineError> {
        let id = ctx.input().value.trim().to_string();
        if id.is_empty() {
            return Err(PipelineError::invalid("resource id is required"));
        }
        ctx.set(RESOURCE_ID, id);
        Ok(())
    }
}

/// Loads the resource about to be deleted into [`EXISTING_RESOURCE`] so it can be returned
/// after it is gone.
pub struct LoadExistingForDeleteStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> LoadExistingForDeleteStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<ResourceId> for LoadExistingForDeleteStep<R> {
    fn name(&self) -> &'static str {
        "LoadExistingForDelete"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::ResourceId])
    }

    async fn execute(&self, ctx: &mut RequestContext<ResourceId>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let id = extracted_id(ctx)?;
        let existing: R = load_resource(ctx.call(), self.store.as_ref(), kind, &id).await?;
        ctx.set(EXISTING_RESOURCE, existing);
        Ok(())
    }
}

/// Removes `{kind}/{id}`. Deleting a key that is not there is `NotFound`.
pub struct DeleteResourceStep {
    store: Arc<dyn ResourceStore>,
}

impl DeleteResourceStep {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Step<ResourceId> for DeleteResourceStep {
    fn name(&self) -> &'static str {
        "DeleteResource"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::ResourceId])
    }

    async fn execute(&self, ctx: &mut RequestContext<ResourceId>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let id = extracted_id(ctx)?;
        ctx.call()
            .guard(self.store.delete(kind, &id))
            .await?
            .map_err(|e| e.into_pipeline(kind, &id))?;
        info!(kind, %id, "Deleted");
        Ok(())
    }
}
