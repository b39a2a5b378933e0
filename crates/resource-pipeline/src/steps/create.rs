use super::find_by_slug;
use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::kind::{generate_id, require_kind};
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::ApiResource;
use crate::store::ResourceStore;
use async_trait::async_trait;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Rejects a resource whose natural key `(kind, owner scope, slug)` is already taken.
pub struct CheckDuplicateStep<R> {
    store: Arc<dyn ResourceStore>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> CheckDuplicateStep<R> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for CheckDuplicateStep<R> {
    fn name(&self) -> &'static str {
        "CheckDuplicate"
    }

    fn contract(&self) -> StepContract {
        StepContract::reads(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?.name();
        let meta = ctx.new_state()?.metadata();
        if meta.slug.is_empty() {
            return Err(PipelineError::internal(
                "slug must be resolved before the duplicate check",
            ));
        }

        let matches: Vec<R> =
            find_by_slug(ctx.call(), self.store.as_ref(), kind, &meta.owner_scope, &meta.slug)
                .await?;

        // Any match is a duplicate, including one that carries the caller's own id.
        match matches.into_iter().next() {
            Some(existing) => Err(PipelineError::AlreadyExists {
                kind: kind.to_string(),
                slug: meta.slug.clone(),
                id: existing.id().to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Turns the input into a fresh resource: id, kind, api version and audit timestamps.
///
/// An id that is already set is kept. Status is cleared; it belongs to the system.
pub struct BuildNewStateStep<R> {
    _resource: PhantomData<fn() -> R>,
}

impl<R> BuildNewStateStep<R> {
    pub fn new() -> Self {
        Self {
            _resource: PhantomData,
        }
    }
}

impl<R> Default for BuildNewStateStep<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for BuildNewStateStep<R> {
    fn name(&self) -> &'static str {
        "BuildNewState"
    }

    fn contract(&self) -> StepContract {
        StepContract::fills(&[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let kind = require_kind(ctx.call())?;
        if !ctx.has_new_state() {
            let seed = ctx.input().clone();
            ctx.set_new_state(seed);
        }

        let state = ctx.new_state_mut()?;
        {
            let type_meta = state.type_meta_mut();
            type_meta.kind = kind.name().to_string();
            type_meta.api_version = R::API_VERSION.to_string();
        }

        let now = Utc::now();
        let meta = state.metadata_mut();
        if meta.id.is_empty() {
            meta.id = generate_id(kind);
        }
        meta.created_at = Some(now);
        meta.updated_at = Some(now);
        let id = meta.id.clone();

        state.reset_status();
        debug!(kind = kind.name(), %id, "Built new state");
        Ok(())
    }
}
