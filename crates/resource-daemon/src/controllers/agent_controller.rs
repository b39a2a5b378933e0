//! # Agent Controller
//!
//! Creating an agent is the one write in this daemon that reaches into another domain: after
//! the agent is persisted, a default [`AgentInstance`] is created through the instance
//! controller and its id is written back onto the agent.
//!
//! ```text
//! Validate → ResolveSlug → CheckDuplicate → BuildNewState → Persist
//!          → CreateDefaultInstance → UpdateAgentStatusWithDefaultInstance
//! ```
//!
//! A failure after the first `Persist` leaves the agent stored without a default instance.
//! Nothing is rolled back.

use super::pipelines;
use crate::clients::AgentInstanceClient;
use crate::model::{Agent, AgentInstance};
use async_trait::async_trait;
use resource_pipeline::steps::PersistStep;
use resource_pipeline::store::ResourceStore;
use resource_pipeline::{
    CallContext, Pipeline, PipelineError, RequestContext, ResourceController, ResourceId,
    ResourceReference, Slot, Step, StepContract,
};
use std::sync::Arc;
use tracing::info;

/// Metadata key (`String`): id of the default instance created for a new agent.
pub const DEFAULT_INSTANCE_ID: &str = "default_instance_id";

/// Creates the `{slug}-default` instance of the agent in `new_state`.
pub struct CreateDefaultInstanceStep {
    instances: AgentInstanceClient,
}

impl CreateDefaultInstanceStep {
    pub fn new(instances: AgentInstanceClient) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl Step<Agent> for CreateDefaultInstanceStep {
    fn name(&self) -> &'static str {
        "CreateDefaultInstance"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<Agent>) -> Result<(), PipelineError> {
        let agent = ctx.new_state()?;
        if agent.metadata.id.is_empty() {
            return Err(PipelineError::internal("agent has no id; persist it first"));
        }

        let mut instance = AgentInstance::new(
            format!("{}-default", agent.metadata.slug),
            agent.metadata.id.clone(),
        );
        instance.metadata.owner_scope = agent.metadata.owner_scope.clone();
        instance.spec.description = format!("Default instance of {}", agent.metadata.name);

        let created = self.instances.create_as_system(ctx.call(), instance).await?;
        info!(
            agent_id = %agent.metadata.id,
            instance_id = %created.metadata.id,
            "Created default instance"
        );
        ctx.set(DEFAULT_INSTANCE_ID, created.metadata.id);
        Ok(())
    }
}

/// Records [`DEFAULT_INSTANCE_ID`] on the agent's status and persists the agent again.
pub struct UpdateAgentStatusWithDefaultInstanceStep {
    persist: PersistStep<Agent>,
}

impl UpdateAgentStatusWithDefaultInstanceStep {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            persist: PersistStep::new(store),
        }
    }
}

#[async_trait]
impl Step<Agent> for UpdateAgentStatusWithDefaultInstanceStep {
    fn name(&self) -> &'static str {
        "UpdateAgentStatusWithDefaultInstance"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<Agent>) -> Result<(), PipelineError> {
        let instance_id = ctx
            .get::<String>(DEFAULT_INSTANCE_ID)
            .cloned()
            .ok_or(PipelineError::StateNotSet(DEFAULT_INSTANCE_ID))?;
        ctx.new_state_mut()?.status.default_instance_id = instance_id;
        self.persist.execute(ctx).await
    }
}

pub struct AgentController {
    create: Pipeline<Agent>,
    update: Pipeline<Agent>,
    apply: Pipeline<Agent>,
    get: Pipeline<ResourceId>,
    get_by_reference: Pipeline<ResourceReference>,
    delete: Pipeline<ResourceId>,
}

impl AgentController {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        instances: AgentInstanceClient,
    ) -> Result<Self, PipelineError> {
        let create = pipelines::create::<Agent>("agent", &store)
            .add_step(CreateDefaultInstanceStep::new(instances))
            .add_step(UpdateAgentStatusWithDefaultInstanceStep::new(store.clone()))
            .build()?;

        Ok(Self {
            create,
            update: pipelines::update("agent", &store).build()?,
            apply: pipelines::apply_lookup("agent", &store)?,
            get: pipelines::get::<Agent>("agent", &store)?,
            get_by_reference: pipelines::get_by_reference::<Agent>("agent", &store)?,
            delete: pipelines::delete::<Agent>("agent", &store)?,
        })
    }
}

#[async_trait]
impl ResourceController<Agent> for AgentController {
    async fn create(&self, call: CallContext, resource: Agent) -> Result<Agent, PipelineError> {
        pipelines::write(&self.create, call, resource).await
    }

    async fn update(&self, call: CallContext, resource: Agent) -> Result<Agent, PipelineError> {
        pipelines::write(&self.update, call, resource).await
    }

    async fn delete(&self, call: CallContext, id: ResourceId) -> Result<Agent, PipelineError> {
        pipelines::remove(&self.delete, call, id).await
    }

    async fn get(&self, call: CallContext, id: ResourceId) -> Result<Agent, PipelineError> {
        pipelines::query(&self.get, call, id).await
    }

    async fn apply(&self, call: CallContext, resource: Agent) -> Result<Agent, PipelineError> {
        pipelines::apply(self, &self.apply, call, resource).await
    }

    async fn get_by_reference(
        &self,
        call: CallContext,
        reference: ResourceReference,
    ) -> Result<Agent, PipelineError> {
        pipelines::query(&self.get_by_reference, call, reference).await
    }
}
