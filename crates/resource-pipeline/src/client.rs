//! # Domain Clients
//!
//! [`DomainClient`] is the capability a pipeline step uses when it needs another domain's
//! resource: create, get, update, and nothing else. Steps never write another kind's storage
//! directly; they go through the owning controller, so that controller's pipeline (validation,
//! defaults, audit fields) always applies.
//!
//! [`ChannelClient`] is the in-process implementation, talking to a
//! [`ResourceServer`](crate::ResourceServer) over a channel. A remote transport would implement
//! the same trait and nothing calling it would change.

use crate::context::CallContext;
use crate::error::PipelineError;
use crate::message::ControllerRequest;
use crate::resource::{ApiResource, ResourceId, ResourceReference};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

#[async_trait]
pub trait DomainClient<R: ApiResource>: Send + Sync {
    async fn create(&self, call: &CallContext, resource: R) -> Result<R, PipelineError>;

    async fn get(&self, call: &CallContext, id: ResourceId) -> Result<R, PipelineError>;

    async fn update(&self, call: &CallContext, resource: R) -> Result<R, PipelineError>;
}

/// Cloneable client for one [`ResourceServer`](crate::ResourceServer).
pub struct ChannelClient<R> {
    service: String,
    sender: mpsc::Sender<ControllerRequest<R>>,
    timeout: Option<Duration>,
}

impl<R> Clone for ChannelClient<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            sender: self.sender.clone(),
            timeout: self.timeout,
        }
    }
}

impl<R> std::fmt::Debug for ChannelClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<R: ApiResource> ChannelClient<R> {
    pub fn new(service: impl Into<String>, sender: mpsc::Sender<ControllerRequest<R>>) -> Self {
        Self {
            service: service.into(),
            sender,
            timeout: None,
        }
    }

    /// Applies `timeout` as the deadline of every call that does not carry an earlier one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn outbound(&self, call: &CallContext) -> CallContext {
        match self.timeout {
            Some(timeout) => call.clone().with_timeout(timeout),
            None => call.clone(),
        }
    }

    async fn send<F>(&self, call: &CallContext, build: F) -> Result<R, PipelineError>
    where
        F: FnOnce(CallContext, oneshot::Sender<Result<R, PipelineError>>) -> ControllerRequest<R>,
    {
        let call = self.outbound(call);
        let (respond_to, response) = oneshot::channel();
        let request = build(call.clone(), respond_to);
        debug!(service = %self.service, method = request.method(), "Sending request");

        call.guard(self.sender.send(request))
            .await?
            .map_err(|_| PipelineError::Unavailable(format!("{} is closed", self.service)))?;
        call.guard(response).await?.map_err(|_| {
            PipelineError::Unavailable(format!("{} dropped the response", self.service))
        })?
    }

    #[instrument(skip_all, fields(service = %self.service))]
    pub async fn create(&self, call: &CallContext, resource: R) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::Create {
            call,
            resource,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(service = %self.service))]
    pub async fn update(&self, call: &CallContext, resource: R) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::Update {
            call,
            resource,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(service = %self.service))]
    pub async fn apply(&self, call: &CallContext, resource: R) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::Apply {
            call,
            resource,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(service = %self.service, id = %id))]
    pub async fn delete(&self, call: &CallContext, id: ResourceId) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::Delete {
            call,
            id,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(service = %self.service, id = %id))]
    pub async fn get(&self, call: &CallContext, id: ResourceId) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::Get {
            call,
            id,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(service = %self.service, slug = %reference.slug))]
    pub async fn get_by_reference(
        &self,
        call: &CallContext,
        reference: ResourceReference,
    ) -> Result<R, PipelineError> {
        self.send(call, |call, respond_to| ControllerRequest::GetByReference {
            call,
            reference,
            respond_to,
        })
        .await
    }
}

#[async_trait]
impl<R: ApiResource> DomainClient<R> for ChannelClient<R> {
    async fn create(&self, call: &CallContext, resource: R) -> Result<R, PipelineError> {
        ChannelClient::create(self, call, resource).await
    }

    async fn get(&self, call: &CallContext, id: ResourceId) -> Result<R, PipelineError> {
        ChannelClient::get(self, call, id).await
    }

    async fn update(&self, call: &CallContext, resource: R) -> Result<R, PipelineError> {
        ChannelClient::update(self, call, resource).await
    }
}
