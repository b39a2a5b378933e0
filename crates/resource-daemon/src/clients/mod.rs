//! Typed wrappers over [`DomainClient`](resource_pipeline::DomainClient) for the calls one
//! domain makes into another.

pub mod agent_instance_client;

pub use agent_instance_client::*;
