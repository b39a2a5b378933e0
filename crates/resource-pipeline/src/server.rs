//! # In-Process Controller Server
//!
//! [`ResourceServer`] is the receiving half of the in-process transport. It pulls
//! [`ControllerRequest`]s off a bounded channel, runs the [`KindInterceptor`] on
//! `/{service}/{method}` so the call carries its resource kind, and hands the request to the
//! controller.
//!
//! Every request runs on its own task. Pipelines for different requests (even for the same
//! resource id) proceed concurrently; nothing here serializes them.
//!
//! # Usage Pattern
//!
//! 1. **Create**: `ResourceServer::new()` returns the server and a [`ChannelClient`].
//! 2. **Wire**: pass the controller into `server.run(controller)`.
//! 3. **Run**: spawn the run loop. Dropping every client stops it once in-flight requests finish.

use crate::client::ChannelClient;
use crate::controller::ResourceController;
use crate::kind::KindInterceptor;
use crate::message::ControllerRequest;
use crate::resource::ApiResource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct ResourceServer<R> {
    service: String,
    receiver: mpsc::Receiver<ControllerRequest<R>>,
    interceptor: Arc<KindInterceptor>,
}

impl<R: ApiResource> ResourceServer<R> {
    /// Creates a server for `service` and the client that feeds it.
    ///
    /// `buffer_size` bounds the request channel; callers wait when it is full.
    pub fn new(
        buffer_size: usize,
        service: impl Into<String>,
        interceptor: Arc<KindInterceptor>,
    ) -> (Self, ChannelClient<R>) {
        let service = service.into();
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let server = Self {
            service: service.clone(),
            receiver,
            interceptor,
        };
        (server, ChannelClient::new(service, sender))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Serves requests until every client is dropped, then waits for in-flight requests.
    pub async fn run(mut self, controller: Arc<dyn ResourceController<R>>) {
        let service = self.service.clone();
        info!(%service, "Server started");

        let mut in_flight = JoinSet::new();
        let mut served: u64 = 0;

        while let Some(mut request) = self.receiver.recv().await {
            let full_method = format!("/{}/{}", service, request.method());
            let call = std::mem::take(request.call_mut());
            *request.call_mut() = self.interceptor.intercept(&full_method, call);

            debug!(method = %full_method, "Dispatch");
            let controller = controller.clone();
            in_flight.spawn(dispatch(controller, request));
            served += 1;

            // Reap finished tasks so the set does not grow with the request count.
            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    warn!(%service, error = %e, "Request task failed");
                }
            }
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                warn!(%service, error = %e, "Request task failed");
            }
        }
        info!(%service, served, "Shutdown");
    }
}

async fn dispatch<R: ApiResource>(
    controller: Arc<dyn ResourceController<R>>,
    request: ControllerRequest<R>,
) {
    // A caller that gave up dropped its receiver; the result has nowhere to go.
    match request {
        ControllerRequest::Create {
            call,
            resource,
            respond_to,
        } => {
            let _ = respond_to.send(controller.create(call, resource).await);
        }
        ControllerRequest::Update {
            call,
            resource,
            respond_to,
        } => {
            let _ = respond_to.send(controller.update(call, resource).await);
        }
        ControllerRequest::Apply {
            call,
            resource,
            respond_to,
        } => {
            let _ = respond_to.send(controller.apply(call, resource).await);
        }
        ControllerRequest::Delete {
            call,
            id,
            respond_to,
        } => {
            let _ = respond_to.send(controller.delete(call, id).await);
        }
        ControllerRequest::Get {
            call,
            id,
            respond_to,
        } => {
            let _ = respond_to.send(controller.get(call, id).await);
        }
        ControllerRequest::GetByReference {
            call,
            reference,
            respond_to,
        } => {
            let _ = respond_to.send(controller.get_by_reference(call, reference).await);
        }
    }
}

impl<R> std::fmt::Debug for ResourceServer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceServer")
            .field("service", &self.service)
            .finish()
    }
}
