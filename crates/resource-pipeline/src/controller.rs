//! # Resource Controllers
//!
//! A controller owns one resource kind. It builds a [`Pipeline`](crate::Pipeline) per operation
//! once, at construction, and runs the matching one for each call.
//!
//! Apply and get-by-reference are optional; kinds that do not offer them answer
//! `Unimplemented`.

use crate::context::CallContext;
use crate::error::PipelineError;
use crate::resource::{ApiResource, ResourceId, ResourceReference};
use async_trait::async_trait;

#[async_trait]
pub trait ResourceController<R: ApiResource>: Send + Sync + 'static {
    async fn create(&self, call: CallContext, resource: R) -> Result<R, PipelineError>;

    async fn update(&self, call: CallContext, resource: R) -> Result<R, PipelineError>;

    /// Deletes the resource and returns its last stored state.
    async fn delete(&self, call: CallContext, id: ResourceId) -> Result<R, PipelineError>;

    async fn get(&self, call: CallContext, id: ResourceId) -> Result<R, PipelineError>;

    /// Creates or updates by natural key.
    async fn apply(&self, _call: CallContext, _resource: R) -> Result<R, PipelineError> {
        Err(PipelineError::Unimplemented("apply"))
    }

    async fn get_by_reference(
        &self,
        _call: CallContext,
        _reference: ResourceReference,
    ) -> Result<R, PipelineError> {
        Err(PipelineError::Unimplemented("get_by_reference"))
    }
}
