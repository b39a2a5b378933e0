use super::pipelines;
use crate::model::AgentInstance;
use async_trait::async_trait;
use resource_pipeline::store::ResourceStore;
use resource_pipeline::{
    CallContext, Pipeline, PipelineError, ResourceController, ResourceId, ResourceReference,
};
use std::sync::Arc;

/// Serves agent instances with the standard pipelines only.
pub struct AgentInstanceController {
    create: Pipeline<AgentInstance>,
    update: Pipeline<AgentInstance>,
    apply: Pipeline<AgentInstance>,
    get: Pipeline<ResourceId>,
    get_by_reference: Pipeline<ResourceReference>,
    delete: Pipeline<ResourceId>,
}

impl AgentInstanceController {
    pub fn new(store: Arc<dyn ResourceStore>) -> Result<Self, PipelineError> {
        const PREFIX: &str = "agent_instance";
        Ok(Self {
            create: pipelines::create(PREFIX, &store).build()?,
            update: pipelines::update(PREFIX, &store).build()?,
            apply: pipelines::apply_lookup(PREFIX, &store)?,
            get: pipelines::get::<AgentInstance>(PREFIX, &store)?,
            get_by_reference: pipelines::get_by_reference::<AgentInstance>(PREFIX, &store)?,
            delete: pipelines::delete::<AgentInstance>(PREFIX, &store)?,
        })
    }
}

#[async_trait]
impl ResourceController<AgentInstance> for AgentInstanceController {
    async fn create(
        &self,
        call: CallContext,
        resource: AgentInstance,
    ) -> Result<AgentInstance, PipelineError> {
        pipelines::write(&self.create, call, resource).await
    }

    async fn update(
        &self,
        call: CallContext,
        resource: AgentInstance,
    ) -> Result<AgentInstance, PipelineError> {
        pipelines::write(&self.update, call, resource).await
    }

    async fn delete(&self, call: CallContext, id: ResourceId) -> Result<AgentInstance, PipelineError> {
        pipelines::remove(&self.delete, call, id).await
    }

    async fn get(&self, call: CallContext, id: ResourceId) -> Result<AgentInstance, PipelineError> {
        pipelines::query(&self.get, call, id).await
    }

    async fn apply(
        &self,
        call: CallContext,
        resource: AgentInstance,
    ) -> Result<AgentInstance, PipelineError> {
        pipelines::apply(self, &self.apply, call, resource).await
    }

    async fn get_by_reference(
        &self,
        call: CallContext,
        reference: ResourceReference,
    ) -> Result<AgentInstance, PipelineError> {
        pipelines::query(&self.get_by_reference, call, reference).await
    }
}
