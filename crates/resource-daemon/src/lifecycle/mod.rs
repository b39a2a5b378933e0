//! # Daemon Lifecycle
//!
//! Starting, wiring and stopping the controller servers.
//!
//! ## Wiring
//!
//! [`Daemon::start`] follows a fixed order:
//!
//! 1. **Storage**: the file store when `data_dir` is configured, memory otherwise.
//! 2. **Servers**: one [`ResourceServer`](resource_pipeline::ResourceServer) per kind. Creating a
//!    server yields its client before anything runs.
//! 3. **Controllers**: built with the clients of the servers they call (the agent controller
//!    gets an instance client).
//! 4. **Run**: each server is spawned with its controller.
//!
//! ## Shutdown
//!
//! [`Daemon::shutdown`] drops the daemon's clients. A server stops once its channel is closed
//! and its in-flight requests finish. Controllers that hold clients of other servers keep those
//! servers up until they stop themselves, which works because the dependency graph is acyclic.
//!
//! ## Tracing
//!
//! Call [`setup_tracing`] with the configured `log_filter` once, before [`Daemon::start`].
//! `RUST_LOG` takes precedence when set.

pub mod config;
pub mod daemon;

pub use config::*;
pub use daemon::*;
pub use resource_pipeline::tracing::setup_tracing;
