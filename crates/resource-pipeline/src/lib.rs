//! # Resource Pipeline
//!
//! Building blocks for a local daemon that manages typed resources (agents, instances,
//! sessions, skills, workflows, executions) through one uniform lifecycle: create, read,
//! update, delete and apply.
//!
//! ## Architecture Overview
//!
//! Three pieces are shared, unmodified, by every resource kind:
//!
//! 1. **Pipeline engine** ([`Pipeline`], [`Step`], [`RequestContext`]): an operation is an
//!    ordered list of steps run against one request context. The first failing step stops the
//!    run and its error is returned as is.
//! 2. **Storage contract** ([`store::ResourceStore`]): flat key-value storage keyed by
//!    `"{Kind}/{ID}"`, last writer wins.
//! 3. **Stream broker** ([`StreamBroker`]): non-blocking fan-out of resource updates to live
//!    subscribers.
//!
//! Around them:
//!
//! - [`steps`]: the generic step catalog (validate, slug, duplicate check, build, persist,
//!   load, delete, apply resolution, publish).
//! - [`kind`]: resource kinds, id generation and the [`KindInterceptor`] that injects the kind
//!   into each call.
//! - [`ResourceController`], [`ResourceServer`], [`ChannelClient`]: the in-process transport.
//!   Each server runs every request on its own task.
//! - [`DomainClient`]: the create/get/update capability used for cross-domain writes.
//! - [`mock`]: test doubles.
//!
//! ## Request Flow
//!
//! ```text
//! ChannelClient ──► ResourceServer ──► KindInterceptor ──► ResourceController
//!                                                              │
//!                                       Pipeline::execute(RequestContext)
//!                                                              │
//!                                      Step ─► Step ─► ... ─► Step
//!                                       │        │              │
//!                                  ResourceStore          StreamBroker
//! ```
//!
//! ## Concurrency Model
//!
//! - Steps within one pipeline run strictly in order
//! - Pipelines run concurrently, one Tokio task per request
//! - No per-resource lock: two pipelines writing the same id race and the last persist wins
//! - Cancellation and deadlines travel in the [`CallContext`] and cut storage I/O short

pub mod broker;
pub mod client;
pub mod context;
pub mod controller;
pub mod error;
pub mod kind;
pub mod message;
pub mod mock;
pub mod pipeline;
pub mod resource;
pub mod server;
pub mod steps;
pub mod store;
pub mod tracing;
pub mod validation;

pub use broker::{StreamBroker, Subscription, SubscriptionId};
pub use client::{ChannelClient, DomainClient};
pub use context::{CallContext, RequestContext};
pub use controller::ResourceController;
pub use error::{Code, PipelineError, StoreError};
pub use kind::{generate_id, get_resource_kind, ApiResourceKind, KindInterceptor};
pub use message::ControllerRequest;
pub use pipeline::{Pipeline, PipelineBuilder, Slot, Step, StepContract};
pub use resource::{
    ApiResource, ObjectMeta, OwnerScope, ResourceId, ResourceReference, TypeMeta,
};
pub use server::ResourceServer;
pub use validation::{Rules, Violation};
