//! An agent template: instructions plus the model that runs them.
//!
//! Creating an agent also creates its default [`AgentInstance`](super::AgentInstance); the
//! instance id is recorded in [`AgentStatus::default_instance_id`].

use resource_pipeline::validation::Rules;
use resource_pipeline::{ApiResource, ObjectMeta, TypeMeta, Violation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const MODEL_PATTERN: &str = r"^[a-z0-9][a-z0-9._-]*$";

static MODEL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn model_re() -> &'static Result<Regex, regex::Error> {
    MODEL_RE.get_or_init(|| Regex::new(MODEL_PATTERN))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    #[serde(default)]
    pub default_instance_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AgentSpec,
    #[serde(default)]
    pub status: AgentStatus,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            ..Default::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.spec.instructions = instructions.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.spec.model = model.into();
        self
    }
}

impl ApiResource for Agent {
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
        let rules = Rules::new().max_len("spec.description", &self.spec.description, 1000);
        let rules = match model_re() {
            Ok(re) => rules.pattern("spec.model", &self.spec.model, re),
            Err(e) => rules.check("spec.model", false, format!("bad model pattern: {e}")),
        };
        let rules = match self.spec.max_turns {
            Some(turns) => rules.range("spec.max_turns", turns, 1..=100),
            None => rules,
        };
        rules.finish()
    }

    fn merge_from(&mut self, input: &Self) {
        self.spec = input.spec.clone();
    }

    fn reset_status(&mut self) {
        self.status = AgentStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_rules() {
        assert!(Agent::new("a").with_model("claude-3.5_x").validate().is_ok());
        assert!(Agent::new("a").validate().is_ok());

        let err = Agent::new("a").with_model("Big Model").validate().unwrap_err();
        assert_eq!(err.field, "spec.model");

        let mut long = Agent::new("a");
        long.spec.description = "x".repeat(1001);
        assert_eq!(long.validate().unwrap_err().field, "spec.description");

        let mut turns = Agent::new("a");
        turns.spec.max_turns = Some(0);
        assert_eq!(turns.validate().unwrap_err().field, "spec.max_turns");
        turns.spec.max_turns = Some(100);
        assert!(turns.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_status() {
        let mut stored = Agent::new("a");
        stored.status.default_instance_id = "ain-1".into();
        stored.merge_from(&Agent::new("a").with_instructions("be brief"));
        assert_eq!(stored.spec.instructions, "be brief");
        assert_eq!(stored.status.default_instance_id, "ain-1");
    }
}
