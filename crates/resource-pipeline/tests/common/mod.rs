#![allow(dead_code)]

use resource_pipeline::validation::Rules;
use resource_pipeline::{ApiResource, ApiResourceKind, CallContext, ObjectMeta, TypeMeta, Violation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetSpec {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetStatus {
    #[serde(default)]
    pub observed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WidgetSpec,
    #[serde(default)]
    pub status: WidgetStatus,
}

impl ApiResource for Widget {
    const API_VERSION: &'static str = "test.local/v1";

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
            .range("spec.size", self.spec.size, 0..=100)
            .max_len("spec.color", &self.spec.color, 20)
            .finish()
    }

    fn merge_from(&mut self, input: &Self) {
        self.spec = input.spec.clone();
    }

    fn reset_status(&mut self) {
        self.status = WidgetStatus::default();
    }
}

pub fn widget(name: &str) -> Widget {
    Widget {
        metadata: ObjectMeta::named(name),
        ..Default::default()
    }
}

/// Widgets are stored under the Agent kind so ids carry the `agt-` prefix.
pub fn call() -> CallContext {
    CallContext::background().with_kind(ApiResourceKind::Agent)
}
