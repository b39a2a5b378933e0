//! # Resource Kinds
//!
//! Every stored resource carries a stable kind discriminator. The kind decides the storage
//! namespace (`"{Kind}/{ID}"`), the ID prefix, and which controller owns the resource.
//!
//! Kinds reach the pipeline through the [`CallContext`]: the transport runs a
//! [`KindInterceptor`] on each inbound call, which maps the called service onto its declared
//! kind tag once and memoizes the answer. Steps then read it back with [`get_resource_kind`].

use crate::context::CallContext;
use crate::error::PipelineError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{debug, warn};
use ulid::Ulid;

/// The resource types managed by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiResourceKind {
    Agent,
    AgentInstance,
    Session,
    Skill,
    Workflow,
    WorkflowInstance,
    WorkflowExecution,
    AgentExecution,
}

impl ApiResourceKind {
    pub const ALL: [ApiResourceKind; 8] = [
        ApiResourceKind::Agent,
        ApiResourceKind::AgentInstance,
        ApiResourceKind::Session,
        ApiResourceKind::Skill,
        ApiResourceKind::Workflow,
        ApiResourceKind::WorkflowInstance,
        ApiResourceKind::WorkflowExecution,
        ApiResourceKind::AgentExecution,
    ];

    /// Display name, also used as the storage namespace.
    pub fn name(self) -> &'static str {
        match self {
            ApiResourceKind::Agent => "Agent",
            ApiResourceKind::AgentInstance => "AgentInstance",
            ApiResourceKind::Session => "Session",
            ApiResourceKind::Skill => "Skill",
            ApiResourceKind::Workflow => "Workflow",
            ApiResourceKind::WorkflowInstance => "WorkflowInstance",
            ApiResourceKind::WorkflowExecution => "WorkflowExecution",
            ApiResourceKind::AgentExecution => "AgentExecution",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            ApiResourceKind::Agent => "agt",
            ApiResourceKind::AgentInstance => "ain",
            ApiResourceKind::Session => "ses",
            ApiResourceKind::Skill => "skl",
            ApiResourceKind::Workflow => "wfl",
            ApiResourceKind::WorkflowInstance => "wfi",
            ApiResourceKind::WorkflowExecution => "wex",
            ApiResourceKind::AgentExecution => "aex",
        }
    }

    /// The snake_case tag a service declares for itself.
    pub fn tag(self) -> &'static str {
        match self {
            ApiResourceKind::Agent => "agent",
            ApiResourceKind::AgentInstance => "agent_instance",
            ApiResourceKind::Session => "session",
            ApiResourceKind::Skill => "skill",
            ApiResourceKind::Workflow => "workflow",
            ApiResourceKind::WorkflowInstance => "workflow_instance",
            ApiResourceKind::WorkflowExecution => "workflow_execution",
            ApiResourceKind::AgentExecution => "agent_execution",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ApiResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiResourceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| PipelineError::invalid(format!("unknown resource kind tag '{s}'")))
    }
}

/// Generates a fresh `{prefix}-{unique}` identifier for `kind`.
pub fn generate_id(kind: ApiResourceKind) -> String {
    format!(
        "{}-{}",
        kind.id_prefix(),
        Ulid::new().to_string().to_lowercase()
    )
}

/// Returns the kind name injected into the call, or `""` when the transport did not set one.
pub fn get_resource_kind(call: &CallContext) -> &'static str {
    call.kind().map(ApiResourceKind::name).unwrap_or("")
}

/// Like [`get_resource_kind`], but a missing kind is an upstream wiring bug and fails `Internal`.
pub fn require_kind(call: &CallContext) -> Result<ApiResourceKind, PipelineError> {
    call.kind().ok_or_else(|| {
        PipelineError::internal("resource kind missing from call context; is the kind interceptor installed?")
    })
}

/// Resolves the resource kind of an inbound call from its full method name.
///
/// Services register their declared kind tag once at startup. Resolution parses the service
/// name out of `/package.Service/Method`, looks the tag up, and caches the parsed kind
/// (including misses) so the registry is only consulted once per service.
#[derive(Debug, Default)]
pub struct KindInterceptor {
    declared: RwLock<HashMap<String, String>>,
    cache: RwLock<HashMap<String, Option<ApiResourceKind>>>,
}

impl KindInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the kind tag for a fully qualified service name.
    pub fn register(&self, service: impl Into<String>, tag: impl Into<String>) {
        let service = service.into();
        let mut declared = self.declared.write().unwrap_or_else(|e| e.into_inner());
        declared.insert(service.clone(), tag.into());
        drop(declared);
        // A re-declaration must not be shadowed by an earlier answer.
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&service);
    }

    /// Resolves the kind for `full_method` (`/package.Service/Method`).
    pub fn resolve(&self, full_method: &str) -> Option<ApiResourceKind> {
        let service = service_name(full_method)?;

        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(service)
        {
            return *hit;
        }

        let resolved = {
            let declared = self.declared.read().unwrap_or_else(|e| e.into_inner());
            declared.get(service).and_then(|tag| match tag.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!(service, error = %e, "Ignoring invalid kind declaration");
                    None
                }
            })
        };

        debug!(service, kind = ?resolved, "Resolved resource kind");
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(service.to_string(), resolved);
        resolved
    }

    /// Returns `call` with the resolved kind injected. Calls to unknown services pass through.
    pub fn intercept(&self, full_method: &str, call: CallContext) -> CallContext {
        match self.resolve(full_method) {
            Some(kind) => call.with_kind(kind),
            None => call,
        }
    }

    pub fn cached_services(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn service_name(full_method: &str) -> Option<&str> {
    let trimmed = full_method.strip_prefix('/')?;
    let (service, method) = trimmed.split_once('/')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some(service)
}
