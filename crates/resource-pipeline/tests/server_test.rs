mod common;

use async_trait::async_trait;
use common::{widget, Widget};
use resource_pipeline::steps::{
    BuildNewStateStep, CheckDuplicateStep, LoadTargetStep, PersistStep, ResolveSlugStep,
    ValidateStep, TARGET_RESOURCE,
};
use resource_pipeline::store::{MemoryStore, ResourceStore};
use resource_pipeline::{
    get_resource_kind, CallContext, ChannelClient, Code, DomainClient, KindInterceptor, Pipeline,
    PipelineBuilder, PipelineError, RequestContext, ResourceController, ResourceId,
    ResourceReference, ResourceServer,
};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "test.widget.v1.WidgetCommandController";

struct WidgetController {
    create: Pipeline<Widget>,
    get: Pipeline<ResourceId>,
}

impl WidgetController {
    fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            create: PipelineBuilder::new("widget.create")
                .seed_from_input()
                .add_step(ValidateStep::new())
                .add_step(ResolveSlugStep::new())
                .add_step(CheckDuplicateStep::new(store.clone()))
                .add_step(BuildNewStateStep::new())
                .add_step(PersistStep::new(store.clone()))
                .build()
                .unwrap(),
            get: PipelineBuilder::new("widget.get")
                .add_step(LoadTargetStep::<Widget>::new(store))
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl ResourceController<Widget> for WidgetController {
    async fn create(&self, call: CallContext, resource: Widget) -> Result<Widget, PipelineError> {
        let mut ctx = RequestContext::new(call, resource);
        self.create.execute(&mut ctx).await?;
        ctx.into_new_state()
    }

    async fn update(&self, _call: CallContext, _resource: Widget) -> Result<Widget, PipelineError> {
        Err(PipelineError::Unimplemented("update"))
    }

    async fn delete(&self, _call: CallContext, _id: ResourceId) -> Result<Widget, PipelineError> {
        Err(PipelineError::Unimplemented("delete"))
    }

    async fn get(&self, call: CallContext, id: ResourceId) -> Result<Widget, PipelineError> {
        let mut ctx = RequestContext::new(call, id);
        self.get.execute(&mut ctx).await?;
        ctx.take(TARGET_RESOURCE)
            .ok_or(PipelineError::StateNotSet(TARGET_RESOURCE))
    }
}

/// Echoes the kind it observed in the call back as the widget name.
struct KindProbe;

#[async_trait]
impl ResourceController<Widget> for KindProbe {
    async fn create(&self, call: CallContext, _resource: Widget) -> Result<Widget, PipelineError> {
        Ok(widget(get_resource_kind(&call)))
    }

    async fn update(&self, call: CallContext, resource: Widget) -> Result<Widget, PipelineError> {
        self.create(call, resource).await
    }

    async fn delete(&self, call: CallContext, _id: ResourceId) -> Result<Widget, PipelineError> {
        Ok(widget(get_resource_kind(&call)))
    }

    async fn get(&self, _call: CallContext, _id: ResourceId) -> Result<Widget, PipelineError> {
        // never answers in time
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(PipelineError::internal("unreachable"))
    }
}

fn interceptor(tag: &str) -> Arc<KindInterceptor> {
    let interceptor = Arc::new(KindInterceptor::new());
    interceptor.register(SERVICE, tag);
    interceptor
}

fn start(
    controller: Arc<dyn ResourceController<Widget>>,
    interceptor: Arc<KindInterceptor>,
) -> (ChannelClient<Widget>, tokio::task::JoinHandle<()>) {
    let (server, client) = ResourceServer::new(8, SERVICE, interceptor);
    let handle = tokio::spawn(server.run(controller));
    (client, handle)
}

#[tokio::test]
async fn test_create_and_get_through_channel() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let (client, handle) = start(Arc::new(WidgetController::new(store)), interceptor("agent"));

    // The caller sends a bare call; the server injects the kind.
    let call = CallContext::background();
    let created = client.create(&call, widget("Through The Channel")).await.unwrap();
    assert!(created.metadata.id.starts_with("agt-"));
    assert_eq!(created.metadata.slug, "through-the-channel");

    let fetched = client
        .get(&call, ResourceId::new(created.metadata.id.clone()))
        .await
        .unwrap();
    assert_eq!(fetched, created);

    let err = client
        .create(&call, widget("through the channel"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_kind_is_injected_per_service() {
    let (client, handle) = start(Arc::new(KindProbe), interceptor("workflow_execution"));
    let call = CallContext::background();

    let seen = client.create(&call, widget("x")).await.unwrap();
    assert_eq!(seen.metadata.name, "WorkflowExecution");

    let seen = client.delete(&call, ResourceId::new("wex-1")).await.unwrap();
    assert_eq!(seen.metadata.name, "WorkflowExecution");

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_unknown_service_has_no_kind() {
    let (client, handle) = start(Arc::new(KindProbe), Arc::new(KindInterceptor::new()));
    let seen = client
        .create(&CallContext::background(), widget("x"))
        .await
        .unwrap();
    assert_eq!(seen.metadata.name, "");
    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_optional_operations_default_to_unimplemented() {
    let (client, handle) = start(Arc::new(KindProbe), interceptor("agent"));
    let call = CallContext::background();

    let err = client.apply(&call, widget("x")).await.unwrap_err();
    assert_eq!(err, PipelineError::Unimplemented("apply"));

    let err = client
        .get_by_reference(&call, ResourceReference::platform("x"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);

    drop(client);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_client_timeout_bounds_the_wait() {
    let (client, _handle) = start(Arc::new(KindProbe), interceptor("agent"));
    let client = client.with_timeout(Duration::from_millis(250));

    let err = client
        .get(&CallContext::background(), ResourceId::new("agt-1"))
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::DeadlineExceeded);
}

#[tokio::test]
async fn test_cancelled_caller_gets_cancelled() {
    let (client, _handle) = start(Arc::new(KindProbe), interceptor("agent"));
    let call = CallContext::background();
    let pending = {
        let client = client.clone();
        let call = call.clone();
        tokio::spawn(async move { client.get(&call, ResourceId::new("agt-1")).await })
    };
    tokio::task::yield_now().await;
    call.cancel();
    assert_eq!(pending.await.unwrap().unwrap_err(), PipelineError::Cancelled);
}

#[tokio::test]
async fn test_closed_server_is_unavailable() {
    let (server, client) = ResourceServer::<Widget>::new(1, SERVICE, interceptor("agent"));
    drop(server);
    assert!(client.is_closed());

    let err = client
        .create(&CallContext::background(), widget("late"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}

#[tokio::test]
async fn test_channel_client_is_a_domain_client() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let (client, _handle) = start(Arc::new(WidgetController::new(store)), interceptor("agent"));
    let domain: Arc<dyn DomainClient<Widget>> = Arc::new(client);

    let created = domain
        .create(&CallContext::background(), widget("Via Trait"))
        .await
        .unwrap();
    let fetched = domain
        .get(&CallContext::background(), ResourceId::new(created.metadata.id.clone()))
        .await
        .unwrap();
    assert_eq!(fetched.metadata.name, "Via Trait");
}
