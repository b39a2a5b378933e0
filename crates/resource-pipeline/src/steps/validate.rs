use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::pipeline::Step;
use crate::resource::ApiResource;
use crate::validation::validate_metadata;
use async_trait::async_trait;
use std::marker::PhantomData;
use tracing::debug;

/// Checks metadata rules, then the resource's own field constraints, against the input.
pub struct ValidateStep<R> {
    _resource: PhantomData<fn() -> R>,
}

impl<R> ValidateStep<R> {
    pub fn new() -> Self {
        Self {
            _resource: PhantomData,
        }
    }
}

impl<R> Default for ValidateStep<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ApiResource> Step<R> for ValidateStep<R> {
    fn name(&self) -> &'static str {
        "ValidateProto"
    }

    async fn execute(&self, ctx: &mut RequestContext<R>) -> Result<(), PipelineError> {
        let input = ctx.input();
        validate_metadata(input.metadata())
            .and_then(|()| input.validate())
            .map_err(|v| {
                debug!(field = %v.field, "Validation failed");
                PipelineError::InvalidArgument(v.to_string())
            })
    }
}
