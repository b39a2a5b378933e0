use resource_daemon::clients::{AgentInstanceClient, CREATED_BY_LABEL};
use resource_daemon::controllers::AgentController;
use resource_daemon::model::{Agent, AgentInstance};
use resource_pipeline::mock::MockDomainClient;
use resource_pipeline::store::{MemoryStore, ResourceStore};
use resource_pipeline::{
    ApiResourceKind, CallContext, Code, PipelineError, ResourceController, ResourceId,
};
use std::sync::Arc;

fn call() -> CallContext {
    CallContext::background().with_kind(ApiResourceKind::Agent)
}

fn controller(
    store: Arc<dyn ResourceStore>,
    instances: &MockDomainClient<AgentInstance>,
) -> AgentController {
    let client = AgentInstanceClient::new(Arc::new(instances.clone()));
    AgentController::new(store, client).unwrap()
}

/// Real agent pipelines against a memory store, with the instance domain mocked.
#[tokio::test]
async fn test_create_records_default_instance() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let mut instances = MockDomainClient::<AgentInstance>::new();
    let mut created = AgentInstance::new("code-reviewer-default", "agt-ignored");
    created.metadata.id = "ain-01".into();
    instances.expect_create().return_ok(created);

    let agents = controller(store.clone(), &instances);
    let agent = agents
        .create(call(), Agent::new("Code Reviewer"))
        .await
        .unwrap();

    assert_eq!(agent.status.default_instance_id, "ain-01");

    // The instance request was derived from the persisted agent.
    let sent = instances.received();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].metadata.name, "code-reviewer-default");
    assert_eq!(sent[0].spec.agent_id, agent.metadata.id);
    assert_eq!(
        sent[0].metadata.labels.get(CREATED_BY_LABEL).map(String::as_str),
        Some("system")
    );

    // The second persist stored the status.
    let stored = agents
        .get(call(), ResourceId::new(agent.metadata.id.clone()))
        .await
        .unwrap();
    assert_eq!(stored.status.default_instance_id, "ain-01");

    instances.verify();
}

#[tokio::test]
async fn test_instance_failure_leaves_agent_without_default() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let mut instances = MockDomainClient::<AgentInstance>::new();
    instances
        .expect_create()
        .return_err(PipelineError::Unavailable("instances are down".into()));

    let agents = controller(store.clone(), &instances);
    let err = agents
        .create(call(), Agent::new("Orphan"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);

    // Persist ran before the failing step; nothing is rolled back.
    let stored = store.list_by_kind("Agent").await.unwrap();
    assert_eq!(stored.len(), 1);
    let agent: Agent = resource_pipeline::store::decode(&stored[0]).unwrap();
    assert!(agent.status.default_instance_id.is_empty());

    instances.verify();
}

#[tokio::test]
async fn test_invalid_agent_never_calls_instances() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let instances = MockDomainClient::<AgentInstance>::new();
    let agents = controller(store.clone(), &instances);

    let err = agents
        .create(call(), Agent::new("Loud").with_model("NOT A MODEL"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    assert!(instances.received().is_empty());
    assert!(store.list_by_kind("Agent").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_preserves_default_instance() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let mut instances = MockDomainClient::<AgentInstance>::new();
    let mut created = AgentInstance::new("x", "agt-x");
    created.metadata.id = "ain-keep".into();
    instances.expect_create().return_ok(created);

    let agents = controller(store, &instances);
    let agent = agents.create(call(), Agent::new("Keeper")).await.unwrap();

    // Callers cannot overwrite system-owned status through update.
    let mut edit = agent.clone();
    edit.spec.instructions = "new instructions".into();
    edit.status.default_instance_id = "ain-forged".into();
    let updated = agents.update(call(), edit).await.unwrap();

    assert_eq!(updated.spec.instructions, "new instructions");
    assert_eq!(updated.status.default_instance_id, "ain-keep");
    assert!(updated.metadata.updated_at > agent.metadata.updated_at);
    instances.verify();
}

#[tokio::test]
async fn test_apply_creates_then_updates() {
    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let mut instances = MockDomainClient::<AgentInstance>::new();
    let mut created = AgentInstance::new("x", "agt-x");
    created.metadata.id = "ain-apply".into();
    // only the first apply creates
    instances.expect_create().return_ok(created);

    let agents = controller(store.clone(), &instances);
    let first = agents
        .apply(call(), Agent::new("Applied").with_instructions("v1"))
        .await
        .unwrap();
    assert_eq!(first.status.default_instance_id, "ain-apply");

    let second = agents
        .apply(call(), Agent::new("Applied").with_instructions("v2"))
        .await
        .unwrap();
    assert_eq!(second.metadata.id, first.metadata.id);
    assert_eq!(second.spec.instructions, "v2");
    assert_eq!(store.list_by_kind("Agent").await.unwrap().len(), 1);

    instances.verify();
}
