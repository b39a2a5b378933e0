//! # Controller Messages
//!
//! Requests carried from a [`ChannelClient`](crate::ChannelClient) to a
//! [`ResourceServer`](crate::ResourceServer). Each variant maps onto one
//! [`ResourceController`](crate::ResourceController) operation and carries the caller's
//! [`CallContext`] plus a oneshot channel for the answer.

use crate::context::CallContext;
use crate::error::PipelineError;
use crate::resource::{ResourceId, ResourceReference};
use tokio::sync::oneshot;

pub type Response<T> = oneshot::Sender<Result<T, PipelineError>>;

#[derive(Debug)]
pub enum ControllerRequest<R> {
    Create {
        call: CallContext,
        resource: R,
        respond_to: Response<R>,
    },
    Update {
        call: CallContext,
        resource: R,
        respond_to: Response<R>,
    },
    Apply {
        call: CallContext,
        resource: R,
        respond_to: Response<R>,
    },
    Delete {
        call: CallContext,
        id: ResourceId,
        respond_to: Response<R>,
    },
    Get {
        call: CallContext,
        id: ResourceId,
        respond_to: Response<R>,
    },
    GetByReference {
        call: CallContext,
        reference: ResourceReference,
        respond_to: Response<R>,
    },
}

impl<R> ControllerRequest<R> {
    /// RPC method name, used to build `/{service}/{method}`.
    pub fn method(&self) -> &'static str {
        match self {
            ControllerRequest::Create { .. } => "create",
            ControllerRequest::Update { .. } => "update",
            ControllerRequest::Apply { .. } => "apply",
            ControllerRequest::Delete { .. } => "delete",
            ControllerRequest::Get { .. } => "get",
            ControllerRequest::GetByReference { .. } => "getByReference",
        }
    }

    pub(crate) fn call_mut(&mut self) -> &mut CallContext {
        match self {
            ControllerRequest::Create { call, .. }
            | ControllerRequest::Update { call, .. }
            | ControllerRequest::Apply { call, .. }
            | ControllerRequest::Delete { call, .. }
            | ControllerRequest::Get { call, .. }
            | ControllerRequest::GetByReference { call, .. } => call,
        }
    }
}
