use super::config::{ConfigError, DaemonConfig};
use crate::clients::AgentInstanceClient;
use crate::controllers::{
    register_kinds, AgentController, AgentInstanceController, WorkflowExecutionController,
    AGENT_INSTANCE_SERVICE, AGENT_SERVICE, WORKFLOW_EXECUTION_SERVICE,
};
use crate::model::{Agent, AgentInstance, WorkflowExecution};
use resource_pipeline::store::{FileStore, MemoryStore, ResourceStore};
use resource_pipeline::{
    CallContext, ChannelClient, KindInterceptor, PipelineError, ResourceServer, StoreError,
    StreamBroker,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{0} server task failed: {1}")]
    Task(&'static str, String),
}

/// The running daemon: one controller server per resource kind, wired together.
///
/// # Example
///
/// ```ignore
/// let daemon = Daemon::start(DaemonConfig::default()).await?;
///
/// let call = CallContext::background();
/// let agent = daemon.agents.create(&call, Agent::new("Reviewer")).await?;
/// let instance = daemon.agent_instances.get(&call, agent.status.default_instance_id.into()).await?;
///
/// daemon.shutdown().await?;
/// ```
pub struct Daemon {
    pub agents: ChannelClient<Agent>,
    pub agent_instances: ChannelClient<AgentInstance>,
    pub executions: ChannelClient<WorkflowExecution>,
    /// Streaming and status entry points that are not part of the request protocol.
    pub execution_controller: Arc<WorkflowExecutionController>,
    config: DaemonConfig,
    interceptor: Arc<KindInterceptor>,
    store: Arc<dyn ResourceStore>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Daemon {
    /// Opens storage, builds every controller and spawns their servers.
    ///
    /// Servers are created first and their clients handed to the controllers that depend on
    /// them, so no controller needs another to exist at construction time.
    pub async fn start(config: DaemonConfig) -> Result<Self, DaemonError> {
        config.validate()?;

        let store: Arc<dyn ResourceStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir.clone()).await?),
            None => Arc::new(MemoryStore::new()),
        };
        let broker = Arc::new(StreamBroker::with_capacity(config.stream_capacity));
        let interceptor = Arc::new(KindInterceptor::new());
        register_kinds(&interceptor);

        // 1. Servers and their clients
        let (agent_server, agents) = ResourceServer::<Agent>::new(
            config.request_buffer,
            AGENT_SERVICE,
            interceptor.clone(),
        );
        let (instance_server, agent_instances) = ResourceServer::<AgentInstance>::new(
            config.request_buffer,
            AGENT_INSTANCE_SERVICE,
            interceptor.clone(),
        );
        let (execution_server, executions) = ResourceServer::<WorkflowExecution>::new(
            config.request_buffer,
            WORKFLOW_EXECUTION_SERVICE,
            interceptor.clone(),
        );

        let (agents, agent_instances, executions) = match config.request_timeout() {
            Some(timeout) => (
                agents.with_timeout(timeout),
                agent_instances.with_timeout(timeout),
                executions.with_timeout(timeout),
            ),
            None => (agents, agent_instances, executions),
        };

        // 2. Controllers, with their cross-domain clients injected
        let instance_client = AgentInstanceClient::new(Arc::new(agent_instances.clone()));
        let agent_controller = Arc::new(AgentController::new(store.clone(), instance_client)?);
        let instance_controller = Arc::new(AgentInstanceController::new(store.clone())?);
        let execution_controller =
            Arc::new(WorkflowExecutionController::new(store.clone(), broker)?);

        // 3. Run
        let handles = vec![
            (AGENT_SERVICE, tokio::spawn(agent_server.run(agent_controller))),
            (
                AGENT_INSTANCE_SERVICE,
                tokio::spawn(instance_server.run(instance_controller)),
            ),
            (
                WORKFLOW_EXECUTION_SERVICE,
                tokio::spawn(execution_server.run(execution_controller.clone())),
            ),
        ];

        let storage = if config.data_dir.is_some() { "file" } else { "memory" };
        info!(
            storage,
            request_buffer = config.request_buffer,
            stream_capacity = config.stream_capacity,
            "Daemon started"
        );

        Ok(Self {
            agents,
            agent_instances,
            executions,
            execution_controller,
            config,
            interceptor,
            store,
            handles,
        })
    }

    /// Call context for a direct entry point, as the transport would build it for
    /// `full_method` (`/package.Service/Method`): kind injected, configured deadline applied.
    pub fn inbound(&self, full_method: &str) -> CallContext {
        let call = match self.config.request_timeout() {
            Some(timeout) => CallContext::background().with_timeout(timeout),
            None => CallContext::background(),
        };
        self.interceptor.intercept(full_method, call)
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Drops every client and waits for the servers to finish their in-flight requests.
    ///
    /// The agent server holds a client of the instance server, so the instance server stops
    /// once the agent server has.
    pub async fn shutdown(self) -> Result<(), DaemonError> {
        info!("Shutting down daemon...");
        drop(self.agents);
        drop(self.agent_instances);
        drop(self.executions);

        let mut failure = None;
        for (service, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(service, error = %e, "Server task failed");
                failure.get_or_insert(DaemonError::Task(service, e.to_string()));
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                info!("Daemon stopped");
                Ok(())
            }
        }
    }
}
