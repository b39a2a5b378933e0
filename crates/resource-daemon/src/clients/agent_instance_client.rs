//! # Agent Instance Client
//!
//! Used by the agent controller to create default instances. Wraps any
//! `DomainClient<AgentInstance>`: the in-process channel client when the daemon runs, a
//! [`MockDomainClient`](resource_pipeline::mock::MockDomainClient) in tests.

use crate::model::AgentInstance;
use resource_pipeline::{CallContext, DomainClient, PipelineError, ResourceId};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Label marking resources the daemon created on its own behalf.
pub const CREATED_BY_LABEL: &str = "agentic.local/created-by";
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Clone)]
pub struct AgentInstanceClient {
    inner: Arc<dyn DomainClient<AgentInstance>>,
}

impl AgentInstanceClient {
    pub fn new(inner: Arc<dyn DomainClient<AgentInstance>>) -> Self {
        Self { inner }
    }

    /// Creates `instance` as the daemon itself rather than the caller.
    ///
    /// The downstream call shares the caller's deadline and cancellation, but carries no kind;
    /// the instance server injects its own.
    #[instrument(skip_all, fields(agent_id = %instance.spec.agent_id))]
    pub async fn create_as_system(
        &self,
        call: &CallContext,
        mut instance: AgentInstance,
    ) -> Result<AgentInstance, PipelineError> {
        instance
            .metadata
            .labels
            .insert(CREATED_BY_LABEL.to_string(), SYSTEM_ACTOR.to_string());
        debug!(name = %instance.metadata.name, "create_as_system called");
        self.inner.create(&call.child(), instance).await
    }

    pub async fn get(
        &self,
        call: &CallContext,
        id: impl Into<ResourceId>,
    ) -> Result<AgentInstance, PipelineError> {
        self.inner.get(&call.child(), id.into()).await
    }

    pub async fn update(
        &self,
        call: &CallContext,
        instance: AgentInstance,
    ) -> Result<AgentInstance, PipelineError> {
        self.inner.update(&call.child(), instance).await
    }
}

impl std::fmt::Debug for AgentInstanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInstanceClient").finish_non_exhaustive()
    }
}
