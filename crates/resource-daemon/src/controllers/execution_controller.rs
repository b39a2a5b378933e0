//! # Workflow Execution Controller
//!
//! Executions are the streamed resource. Every write ends with `Publish`, so a subscriber sees
//! each persisted state in the order this daemon wrote it.
//!
//! Status changes have their own pipeline:
//!
//! ```text
//! LoadExisting → MergeExecutionStatus → Persist → Publish
//! ```
//!
//! [`WorkflowExecutionController::subscribe`] registers with the broker before reading the
//! snapshot, so no update written after the snapshot is missed.

use super::pipelines;
use crate::model::WorkflowExecution;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use resource_pipeline::steps::{LoadExistingStep, PersistStep, PublishStep};
use resource_pipeline::store::ResourceStore;
use resource_pipeline::{
    CallContext, Pipeline, PipelineBuilder, PipelineError, RequestContext, ResourceController,
    ResourceId, Slot, Step, StepContract, StreamBroker, Subscription, SubscriptionId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Applies the status carried by the input onto the stored execution.
///
/// Terminal phases are final: a stored execution that completed, failed or was cancelled only
/// accepts a repeat of the same phase.
#[derive(Debug, Default)]
pub struct MergeExecutionStatusStep;

#[async_trait]
impl Step<WorkflowExecution> for MergeExecutionStatusStep {
    fn name(&self) -> &'static str {
        "MergeExecutionStatus"
    }

    fn contract(&self) -> StepContract {
        StepContract::new(&[Slot::Existing], &[Slot::NewState])
    }

    async fn execute(
        &self,
        ctx: &mut RequestContext<WorkflowExecution>,
    ) -> Result<(), PipelineError> {
        let incoming = ctx.input().status.clone();
        let mut next = ctx.existing()?.clone();

        let current = next.status.phase;
        if current.is_terminal() && incoming.phase != current {
            return Err(PipelineError::invalid(format!(
                "execution {} is already {current}",
                next.metadata.id
            )));
        }

        let now = Utc::now();
        next.metadata.updated_at = Some(match next.metadata.updated_at {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        });
        debug!(id = %next.metadata.id, from = %current, to = %incoming.phase, "Merging status");
        next.status = incoming;
        ctx.set_new_state(next);
        Ok(())
    }
}

pub struct WorkflowExecutionController {
    create: Pipeline<WorkflowExecution>,
    update: Pipeline<WorkflowExecution>,
    update_status: Pipeline<WorkflowExecution>,
    get: Pipeline<ResourceId>,
    delete: Pipeline<ResourceId>,
    broker: Arc<StreamBroker<WorkflowExecution>>,
}

impl WorkflowExecutionController {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        broker: Arc<StreamBroker<WorkflowExecution>>,
    ) -> Result<Self, PipelineError> {
        const PREFIX: &str = "workflow_execution";

        let update_status = PipelineBuilder::new(format!("{PREFIX}.update_status"))
            .add_step(LoadExistingStep::new(store.clone()))
            .add_step(MergeExecutionStatusStep)
            .add_step(PersistStep::new(store.clone()))
            .add_step(PublishStep::new(broker.clone()))
            .build()?;

        Ok(Self {
            create: pipelines::create(PREFIX, &store)
                .add_step(PublishStep::new(broker.clone()))
                .build()?,
            update: pipelines::update(PREFIX, &store)
                .add_step(PublishStep::new(broker.clone()))
                .build()?,
            update_status,
            get: pipelines::get::<WorkflowExecution>(PREFIX, &store)?,
            delete: pipelines::delete::<WorkflowExecution>(PREFIX, &store)?,
            broker,
        })
    }

    /// Moves an execution to the phase and message carried by `update`, addressed by
    /// `update.metadata.id`.
    pub async fn update_status(
        &self,
        call: CallContext,
        update: WorkflowExecution,
    ) -> Result<WorkflowExecution, PipelineError> {
        let updated = pipelines::write(&self.update_status, call, update).await?;
        info!(id = %updated.metadata.id, phase = %updated.status.phase, "Execution status updated");
        Ok(updated)
    }

    /// Returns the current state of `id` and a subscription to every later write.
    pub async fn subscribe(
        &self,
        call: CallContext,
        id: ResourceId,
    ) -> Result<(WorkflowExecution, Subscription<WorkflowExecution>), PipelineError> {
        let subscription = self.broker.subscribe(id.value.clone());
        match pipelines::query(&self.get, call, id).await {
            Ok(snapshot) => Ok((snapshot, subscription)),
            Err(e) => {
                self.broker
                    .unsubscribe(subscription.resource_id(), subscription.id());
                Err(e)
            }
        }
    }

    pub fn unsubscribe(&self, resource_id: &str, subscription: SubscriptionId) -> bool {
        self.broker.unsubscribe(resource_id, subscription)
    }

    pub fn broker(&self) -> &Arc<StreamBroker<WorkflowExecution>> {
        &self.broker
    }
}

#[async_trait]
impl ResourceController<WorkflowExecution> for WorkflowExecutionController {
    async fn create(
        &self,
        call: CallContext,
        resource: WorkflowExecution,
    ) -> Result<WorkflowExecution, PipelineError> {
        pipelines::write(&self.create, call, resource).await
    }

    async fn update(
        &self,
        call: CallContext,
        resource: WorkflowExecution,
    ) -> Result<WorkflowExecution, PipelineError> {
        pipelines::write(&self.update, call, resource).await
    }

    async fn delete(
        &self,
        call: CallContext,
        id: ResourceId,
    ) -> Result<WorkflowExecution, PipelineError> {
        pipelines::remove(&self.delete, call, id).await
    }

    async fn get(
        &self,
        call: CallContext,
        id: ResourceId,
    ) -> Result<WorkflowExecution, PipelineError> {
        pipelines::query(&self.get, call, id).await
    }
}
