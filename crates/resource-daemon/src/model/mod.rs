//! # Resource Models
//!
//! Plain data types managed by the daemon. Each one implements
//! [`ApiResource`](resource_pipeline::ApiResource), which is all the generic step catalog needs
//! to create, update, load and delete it.

pub mod agent;
pub mod agent_instance;
pub mod workflow_execution;

pub use agent::*;
pub use agent_instance::*;
pub use workflow_execution::*;

/// Version stamped on every resource this daemon creates.
pub const API_VERSION: &str = "agentic.local/v1";
