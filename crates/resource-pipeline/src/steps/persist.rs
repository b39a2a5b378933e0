use crate::broker::StreamBroker;
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::kind::require_kind;
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::ApiResource;
use crate::store::{encode, ResourceStore};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes the working state under `{kind}/{id}`. Unconditional overwrite: last writer wins.
pub struct PersistStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> PersistStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for PersistStep<R> {
    fn name(&self) -> &'static str {
        "Persist"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let state = ctx.new_state()?;
        let id = state.id();
        if id.is_empty() {
            return Err(PipelineError::internal(format!(
                "refusing to persist {kind} without an id"
            )));
        }

        let bytes = encode(state).map_err(|e| e.into_pipeline(kind, id))?;
        let size = bytes.len();
        ctx.call()
            .guard(self.store.put(kind, id, bytes))
            .await?
            .map_err(|e| e.into_pipeline(kind, id))?;

        info!(kind, id, size, "Persisted");
        Ok(())
    }
}

/// Pushes the working state to live subscribers of its id.
pub struct PublishStep<R> {
    broker: Arc<StreamBroker<R>>,
}

impl<R> PublishStep<R> {
    pub fn new(broker: Arc<StreamBroker<R>>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for PublishStep<R> {
    fn name(&self) -> &'static str {
        "Publish"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let state = ctx.new_state()?;
        let delivered = self.broker.broadcast(state);
        debug!(id = state.id(), delivered, "Published");
        Ok(())
    }
}
