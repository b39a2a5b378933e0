//! One run of a workflow instance. Its status is streamed to subscribers as it changes.

use resource_pipeline::validation::Rules;
use resource_pipeline::{ApiResource, ObjectMeta, TypeMeta, Violation};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionPhase {
    /// No further transitions leave a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed | ExecutionPhase::Failed | ExecutionPhase::Cancelled
        )
    }
}

impl Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionPhase::Pending => "pending",
            ExecutionPhase::InProgress => "in_progress",
            ExecutionPhase::Completed => "completed",
            ExecutionPhase::Failed => "failed",
            ExecutionPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionSpec {
    #[serde(default)]
    pub workflow_instance_id: String,
    #[serde(default)]
    pub trigger_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionStatus {
    #[serde(default)]
    pub phase: ExecutionPhase,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowExecutionSpec,
    #[serde(default)]
    pub status: WorkflowExecutionStatus,
}

impl WorkflowExecution {
    pub fn new(name: impl Into<String>, workflow_instance_id: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: WorkflowExecutionSpec {
                workflow_instance_id: workflow_instance_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A status-only update addressed to the execution `id`.
    pub fn status_update(
        id: impl Into<String>,
        phase: ExecutionPhase,
        message: impl Into<String>,
    ) -> Self {
        let mut update = Self::default();
        update.metadata.id = id.into();
        update.status = WorkflowExecutionStatus {
            phase,
            message: message.into(),
        };
        update
    }
}

impl ApiResource for WorkflowExecution {
    const API_VERSION: &'static str = super::API_VERSION;

    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> Result<(), Violation> {
        Rules::new()
            .required("spec.workflow_instance_id", &self.spec.workflow_instance_id)
            .finish()
    }

    fn merge_from(&mut self, input: &Self) {
        self.spec.trigger_message = input.spec.trigger_message.clone();
    }

    fn reset_status(&mut self) {
        self.status = WorkflowExecutionStatus::default();
    }
}
