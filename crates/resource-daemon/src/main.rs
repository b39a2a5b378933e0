//! # Resource Daemon
//!
//! A local daemon that manages agents, agent instances and workflow executions through the
//! generic [`resource_pipeline`] engine.
//!
//! ## Core Components
//!
//! - **[model]**: the resource types ([`Agent`], [`AgentInstance`], [`WorkflowExecution`]).
//! - **[controllers]**: one controller per kind, each a set of pipelines.
//! - **[clients]**: typed cross-domain clients.
//! - **[lifecycle]**: configuration plus starting and stopping the [`Daemon`].
//!
//! ## Quick Start
//!
//! `main` walks one agent and one execution through their lifecycle:
//! 1. Load [`DaemonConfig`] from the environment and start the [`Daemon`].
//! 2. Create an agent (its default instance is created with it) and update it.
//! 3. Stream status changes of a workflow execution.
//! 4. Delete the agent and shut down.

use resource_daemon::controllers::WORKFLOW_EXECUTION_SERVICE;
use resource_daemon::lifecycle::{setup_tracing, Daemon, DaemonConfig};
use resource_daemon::model::{Agent, ExecutionPhase, WorkflowExecution};
use resource_pipeline::{CallContext, ResourceId};
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaemonConfig::from_env()?;
    setup_tracing(&config.log_filter);

    info!("Starting resource daemon");
    let daemon = Daemon::start(config).await?;
    let call = CallContext::background();

    // Agent lifecycle
    let span = tracing::info_span!("agent_lifecycle");
    let agent = async {
        let agent = daemon
            .agents
            .create(
                &call,
                Agent::new("Code Reviewer")
                    .with_model("local-llm")
                    .with_instructions("Review the diff."),
            )
            .await?;
        info!(
            agent_id = %agent.metadata.id,
            slug = %agent.metadata.slug,
            default_instance = %agent.status.default_instance_id,
            "Agent created"
        );

        let mut edit = agent.clone();
        edit.spec.description = "Reviews pull requests".to_string();
        let agent = daemon.agents.update(&call, edit).await?;
        info!(agent_id = %agent.metadata.id, "Agent updated");
        Ok::<_, resource_pipeline::PipelineError>(agent)
    }
    .instrument(span)
    .await?;

    // Execution streaming
    let span = tracing::info_span!("execution_stream");
    let streamed = async {
        let execution = daemon
            .executions
            .create(&call, WorkflowExecution::new("nightly review", "wfi-nightly"))
            .await?;
        let id = execution.metadata.id.clone();

        let controller = &daemon.execution_controller;
        let inbound = daemon.inbound(&format!("/{WORKFLOW_EXECUTION_SERVICE}/subscribe"));
        let (snapshot, mut subscription) = controller
            .subscribe(inbound.clone(), ResourceId::new(id.clone()))
            .await?;
        info!(execution_id = %id, phase = %snapshot.status.phase, "Subscribed");

        for (phase, message) in [
            (ExecutionPhase::InProgress, "reviewing"),
            (ExecutionPhase::Completed, "done"),
        ] {
            let update = WorkflowExecution::status_update(id.clone(), phase, message);
            controller.update_status(inbound.clone(), update).await?;
        }

        let mut seen = 0;
        while let Some(update) = subscription.try_recv() {
            seen += 1;
            info!(execution_id = %id, phase = %update.status.phase, "Status changed");
        }
        controller.unsubscribe(&id, subscription.id());
        Ok::<_, resource_pipeline::PipelineError>(seen)
    }
    .instrument(span)
    .await;

    match streamed {
        Ok(seen) => info!(updates = seen, "Execution stream finished"),
        Err(e) => error!(error = %e, "Execution stream failed"),
    }

    daemon
        .agents
        .delete(&call, ResourceId::new(agent.metadata.id.clone()))
        .await?;
    info!(agent_id = %agent.metadata.id, "Agent deleted");

    daemon.shutdown().await?;
    info!("Daemon completed successfully");
    Ok(())
}
