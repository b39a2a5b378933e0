use resource_daemon::controllers::WORKFLOW_EXECUTION_SERVICE;
use resource_daemon::lifecycle::{Daemon, DaemonConfig};
use resource_daemon::model::{Agent, AgentInstance, ExecutionPhase, WorkflowExecution};
use resource_pipeline::{
    get_resource_kind, CallContext, Code, OwnerScope, PipelineError, ResourceId,
    ResourceReference,
};
use std::time::Duration;

/// Full end-to-end flow with every server running.
#[tokio::test]
async fn test_agent_lifecycle() {
    let daemon = Daemon::start(DaemonConfig::default()).await.unwrap();
    let call = CallContext::background();

    // Create
    let agent = daemon
        .agents
        .create(&call, Agent::new("My Agent"))
        .await
        .expect("Failed to create agent");
    let id_pattern = regex::Regex::new(r"^agt-[0-9a-z]+$").unwrap();
    assert!(id_pattern.is_match(&agent.metadata.id));
    assert_eq!(agent.metadata.slug, "my-agent");
    assert_eq!(agent.type_meta.kind, "Agent");
    assert!(agent.metadata.created_at.is_some());

    // The default instance went through the instance controller.
    let instance: AgentInstance = daemon
        .agent_instances
        .get(&call, ResourceId::new(agent.status.default_instance_id.clone()))
        .await
        .expect("Default instance missing");
    assert!(instance.metadata.id.starts_with("ain-"));
    assert_eq!(instance.metadata.slug, "my-agent-default");
    assert_eq!(instance.spec.agent_id, agent.metadata.id);

    // Duplicate natural key
    let err = daemon
        .agents
        .create(&call, Agent::new("my agent"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyExists { ref id, .. } if *id == agent.metadata.id));

    // Update
    let mut edit = agent.clone();
    edit.metadata.name = "New".into();
    let updated = daemon.agents.update(&call, edit).await.unwrap();
    assert_eq!(updated.metadata.name, "New");
    assert_eq!(updated.metadata.slug, "my-agent");
    assert_eq!(updated.metadata.created_at, agent.metadata.created_at);
    assert!(updated.metadata.updated_at > agent.metadata.updated_at);

    // By reference
    let found = daemon
        .agents
        .get_by_reference(&call, ResourceReference::platform("my-agent"))
        .await
        .unwrap();
    assert_eq!(found.metadata.id, agent.metadata.id);

    // Delete
    let deleted = daemon
        .agents
        .delete(&call, ResourceId::new(agent.metadata.id.clone()))
        .await
        .unwrap();
    assert_eq!(deleted.metadata.name, "New");

    let err = daemon
        .agents
        .get(&call, ResourceId::new(agent.metadata.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slugs_are_scoped_by_owner() {
    let daemon = Daemon::start(DaemonConfig::default()).await.unwrap();
    let call = CallContext::background();

    let platform = daemon.agents.create(&call, Agent::new("Shared")).await.unwrap();
    let mut scoped = Agent::new("Shared");
    scoped.metadata.owner_scope = OwnerScope::Organization { org: "acme".into() };
    let scoped = daemon.agents.create(&call, scoped).await.unwrap();
    assert_ne!(platform.metadata.id, scoped.metadata.id);

    let found = daemon
        .agents
        .get_by_reference(&call, ResourceReference::in_org("acme", "shared"))
        .await
        .unwrap();
    assert_eq!(found.metadata.id, scoped.metadata.id);

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_instance_requires_agent_reference() {
    let daemon = Daemon::start(DaemonConfig::default()).await.unwrap();
    let err = daemon
        .agent_instances
        .create(&CallContext::background(), AgentInstance::new("loose", ""))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_execution_stream() {
    let daemon = Daemon::start(DaemonConfig::default()).await.unwrap();
    let call = CallContext::background();

    let execution = daemon
        .executions
        .create(&call, WorkflowExecution::new("run", "wfi-1"))
        .await
        .unwrap();
    assert!(execution.metadata.id.starts_with("wex-"));
    assert_eq!(execution.status.phase, ExecutionPhase::Pending);
    let id = execution.metadata.id.clone();

    let controller = daemon.execution_controller.clone();
    let inbound = daemon.inbound(&format!("/{WORKFLOW_EXECUTION_SERVICE}/subscribe"));
    assert_eq!(get_resource_kind(&inbound), "WorkflowExecution");

    let (snapshot, mut subscription) = controller
        .subscribe(inbound.clone(), ResourceId::new(id.clone()))
        .await
        .unwrap();
    assert_eq!(snapshot, execution);

    controller
        .update_status(
            inbound.clone(),
            WorkflowExecution::status_update(id.clone(), ExecutionPhase::InProgress, "working"),
        )
        .await
        .unwrap();
    controller
        .update_status(
            inbound.clone(),
            WorkflowExecution::status_update(id.clone(), ExecutionPhase::Completed, "done"),
        )
        .await
        .unwrap();

    let first = subscription.recv().await.unwrap();
    let second = subscription.recv().await.unwrap();
    assert_eq!(first.status.phase, ExecutionPhase::InProgress);
    assert_eq!(second.status.phase, ExecutionPhase::Completed);
    assert_eq!(second.status.message, "done");
    assert_eq!(second.spec.workflow_instance_id, "wfi-1");

    // terminal phases are final
    let err = controller
        .update_status(
            inbound.clone(),
            WorkflowExecution::status_update(id.clone(), ExecutionPhase::InProgress, "again"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    assert!(controller.unsubscribe(&id, subscription.id()));
    assert!(!controller.unsubscribe(&id, subscription.id()));
    assert!(subscription.recv().await.is_none());

    // Writes through the channel publish too.
    let (_, mut late) = controller
        .subscribe(inbound.clone(), ResourceId::new(id.clone()))
        .await
        .unwrap();
    let mut edit = second.clone();
    edit.spec.trigger_message = "rerun please".into();
    daemon.executions.update(&call, edit).await.unwrap();
    let published = tokio::time::timeout(Duration::from_secs(1), late.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.spec.trigger_message, "rerun please");

    drop(controller);
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_to_missing_execution() {
    let daemon = Daemon::start(DaemonConfig::default()).await.unwrap();
    let inbound = daemon.inbound(&format!("/{WORKFLOW_EXECUTION_SERVICE}/subscribe"));
    let err = daemon
        .execution_controller
        .subscribe(inbound, ResourceId::new("wex-missing"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(
        daemon.execution_controller.broker().subscriber_count("wex-missing"),
        0
    );
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = DaemonConfig::default().with_data_dir(dir.path());
    let call = CallContext::background();

    let daemon = Daemon::start(config.clone()).await.unwrap();
    let agent = daemon
        .agents
        .create(&call, Agent::new("Persistent"))
        .await
        .unwrap();
    daemon.shutdown().await.unwrap();

    assert!(dir.path().join("Agent").join(&agent.metadata.id).exists());

    let restarted = Daemon::start(config).await.unwrap();
    let reloaded = restarted
        .agents
        .get(&call, ResourceId::new(agent.metadata.id.clone()))
        .await
        .unwrap();
    assert_eq!(reloaded, agent);
    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_config_file_drives_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    std::fs::write(
        &path,
        r#"{ "request_buffer": 4, "stream_capacity": 2, "request_timeout_ms": 5000 }"#,
    )
    .unwrap();

    let config = DaemonConfig::from_file(&path).unwrap();
    assert_eq!(config.request_buffer, 4);
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));

    let daemon = Daemon::start(config).await.unwrap();
    assert_eq!(daemon.execution_controller.broker().capacity(), 2);
    assert!(daemon.inbound("/unknown.Service/get").deadline().is_some());
    daemon.shutdown().await.unwrap();

    std::fs::write(&path, r#"{ "request_buffer": 4, "colour": "blue" }"#).unwrap();
    assert!(DaemonConfig::from_file(&path).is_err());
}
