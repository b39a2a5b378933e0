//! # Resource Envelope
//!
//! The [`ApiResource`] trait is the contract every resource type satisfies to flow through the
//! generic step catalog. It plays the role an entity trait plays for a per-type server: the
//! steps are written once against it and reused unmodified for every kind.
//!
//! Each resource carries a [`TypeMeta`] (api version + kind) and an [`ObjectMeta`] (id, name,
//! slug, owner scope, labels, audit timestamps). The natural key of a resource is
//! `(kind, owner_scope, slug)`.

use crate::kind::ApiResourceKind;
use crate::validation::Violation;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

/// Tenancy boundary within which slugs are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum OwnerScope {
    #[default]
    Platform,
    Organization { org: String },
}

impl OwnerScope {
    pub fn org(&self) -> Option<&str> {
        match self {
            OwnerScope::Platform => None,
            OwnerScope::Organization { org } => Some(org),
        }
    }
}

impl Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerScope::Platform => f.write_str("platform"),
            OwnerScope::Organization { org } => write!(f, "org:{org}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub owner_scope: OwnerScope,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A resource message managed by the pipeline engine.
pub trait ApiResource:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Version string stamped on new resources, e.g. `agentic.ai/v1`.
    const API_VERSION: &'static str;

    fn type_meta(&self) -> &TypeMeta;
    fn type_meta_mut(&mut self) -> &mut TypeMeta;
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Resource-specific field constraints. Metadata rules are checked by the validate step.
    fn validate(&self) -> Result<(), Violation> {
        Ok(())
    }

    /// Copies the mutable spec fields of `input` onto `self`.
    fn merge_from(&mut self, input: &Self);

    /// Clears system-owned status before a resource is first stored.
    fn reset_status(&mut self) {}

    fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Identifier wrapper used as the input of get and delete pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub value: String,
}

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self { value }
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Addresses a resource by its natural key instead of its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ApiResourceKind>,
    /// `None` addresses the platform scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    pub slug: String,
}

impl ResourceReference {
    pub fn platform(slug: impl Into<String>) -> Self {
        Self {
            kind: None,
            org: None,
            slug: slug.into(),
        }
    }

    pub fn in_org(org: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            kind: None,
            org: Some(org.into()),
            slug: slug.into(),
        }
    }

    pub fn of_kind(mut self, kind: ApiResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn owner_scope(&self) -> OwnerScope {
        match &self.org {
            Some(org) if !org.is_empty() => OwnerScope::Organization { org: org.clone() },
            _ => OwnerScope::Platform,
        }
    }
}
