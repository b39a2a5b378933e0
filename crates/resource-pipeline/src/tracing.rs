//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide `tracing` subscriber: compact format, no module
//! targets, filtered by `RUST_LOG` and falling back to the filter the caller passes in (the
//! daemon's configured `log_filter`).
//!
//! ## What Gets Traced
//!
//! - **Pipelines**: a `pipeline` span per run with a nested `step` span per step; `debug` on
//!   start, step completion and finish, `warn` with the step name when a step fails
//! - **Storage**: `info` on persist and delete, `debug` on raw store operations
//! - **Broker**: subscribe, unsubscribe and broadcast counts at `debug`; dropped updates at `warn`
//! - **Servers**: start and shutdown at `info`
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-daemon
//! RUST_LOG=resource_pipeline=debug cargo run -p resource-daemon
//! ```

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Returns `false` if one was already installed.
pub fn setup_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
