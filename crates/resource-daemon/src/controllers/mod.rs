//! # Controllers
//!
//! One controller per resource kind. Each builds its pipelines once at construction from the
//! shared builders in [`pipelines`], appending kind-specific steps where the kind needs them,
//! and picks the matching pipeline for every call.
//!
//! | Controller | Custom steps |
//! |---|---|
//! | [`AgentController`] | `CreateDefaultInstance`, `UpdateAgentStatusWithDefaultInstance` |
//! | [`AgentInstanceController`] | none |
//! | [`WorkflowExecutionController`] | `MergeExecutionStatus`, plus `Publish` on every write |
//!
//! Each controller is served under a fully qualified service name. The names are registered
//! with the [`KindInterceptor`] so inbound calls carry the kind their steps read.

pub mod agent_controller;
pub mod agent_instance_controller;
pub mod execution_controller;
pub mod pipelines;

pub use agent_controller::*;
pub use agent_instance_controller::*;
pub use execution_controller::*;

use resource_pipeline::{ApiResourceKind, KindInterceptor};

pub const AGENT_SERVICE: &str = "agentic.agent.v1.AgentCommandController";
pub const AGENT_INSTANCE_SERVICE: &str = "agentic.agentinstance.v1.AgentInstanceCommandController";
pub const WORKFLOW_EXECUTION_SERVICE: &str =
    "agentic.workflowexecution.v1.WorkflowExecutionCommandController";

/// Declares the kind of every service this daemon serves.
pub fn register_kinds(interceptor: &KindInterceptor) {
    interceptor.register(AGENT_SERVICE, ApiResourceKind::Agent.tag());
    interceptor.register(AGENT_INSTANCE_SERVICE, ApiResourceKind::AgentInstance.tag());
    interceptor.register(
        WORKFLOW_EXECUTION_SERVICE,
        ApiResourceKind::WorkflowExecution.tag(),
    );
}
