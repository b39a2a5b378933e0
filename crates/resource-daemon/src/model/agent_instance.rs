//! A configured, runnable copy of an [`Agent`](super::Agent).

use resource_pipeline::validation::Rules;
use resource_pipeline::{ApiResource, ApiResourceKind, ObjectMeta, TypeMeta, Violation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInstanceSpec {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_refs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInstance {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AgentInstanceSpec,
}

impl AgentInstance {
    pub fn new(name: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: AgentInstanceSpec {
                agent_id: agent_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl ApiResource for AgentInstance {
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
        let prefix = format!("{}-", ApiResourceKind::Agent.id_prefix());
        Rules::new()
            .required("spec.agent_id", &self.spec.agent_id)
            .check(
                "spec.agent_id",
                self.spec.agent_id.starts_with(&prefix),
                format!("value must start with '{prefix}'"),
            )
            .max_len("spec.description", &self.spec.description, 1000)
            .finish()
    }

    fn merge_from(&mut self, input: &Self) {
        // The owning agent never changes.
        self.spec.description = input.spec.description.clone();
        self.spec.environment_refs = input.spec.environment_refs.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_rules() {
        assert!(AgentInstance::new("i", "agt-01").validate().is_ok());
        let missing = AgentInstance::new("i", "").validate().unwrap_err();
        assert_eq!(missing.message, "value is required");
        assert!(AgentInstance::new("i", "ses-01").validate().is_err());
    }

    #[test]
    fn test_merge_keeps_owner() {
        let mut stored = AgentInstance::new("i", "agt-01");
        let mut input = AgentInstance::new("i", "agt-02");
        input.spec.environment_refs = vec!["env-a".into()];
        stored.merge_from(&input);
        assert_eq!(stored.spec.agent_id, "agt-01");
        assert_eq!(stored.spec.environment_refs, vec!["env-a".to_string()]);
    }
}
