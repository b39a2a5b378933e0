use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::pipeline::{Slot, Step, StepContract};
use crate::resource::ApiResource;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::marker::PhantomData;
use tracing::debug;

/// Builds the next version of a resource from `existing` plus the caller's changes.
///
/// Starts from a copy of `existing`, takes name and labels from the input when given and lets
/// the resource merge its spec. Id, slug, owner scope, type, status and `created_at` stay as
/// stored. `updated_at` always moves forward, even when the clock has not.
pub struct BuildUpdateStateStep<R> {
    _resource: PhantomData<fn() -> R>,
}

impl<R> BuildUpdateStateStep<R> {
    pub fn new() -> Self {
        Self {
            _resource: PhantomData,
        }
    }
}

impl<R> Default for BuildUpdateStateStep<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for BuildUpdateStateStep<R> {
    fn name(&self) -> &'static str {
        "BuildUpdateState"
    }

    fn contract(&self) -> StepContract {
        StepContract::new(&[Slot::Existing], &[Slot::NewState])
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let existing = ctx.existing()?;
        let input = ctx.input();

        let mut next = existing.clone();
        next.merge_from(input);

        let requested = input.metadata();
        let meta = next.metadata_mut();
        if !requested.name.trim().is_empty() {
            meta.name = requested.name.clone();
        }
        if !requested.labels.is_empty() {
            meta.labels = requested.labels.clone();
        }

        let now = Utc::now();
        meta.updated_at = Some(match existing.metadata().updated_at {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        });

        debug!(id = %meta.id, "Built update state");
        ctx.set_new_state(next);
        Ok(())
    }
}
