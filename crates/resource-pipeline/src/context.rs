//! # Request Context
//!
//! Two layers of per-call state flow through a pipeline:
//!
//! - [`CallContext`]: the outer call. Carries cancellation, an optional deadline and the
//!   resource kind injected by the transport. Cheap to clone.
//! - [`RequestContext<T>`]: the working set of one pipeline run. Holds the caller's input, the
//!   state being built (`new_state`), the previously persisted value (`existing`), and a
//!   string-keyed metadata bag for ad hoc cross-step data.
//!
//! Reading `new_state` or `existing` before a step has filled them is an error
//! ([`PipelineError::StateNotSet`]), never a default value.

use crate::error::PipelineError;
use crate::kind::ApiResourceKind;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation, deadline and injected metadata of one inbound call.
#[derive(Clone, Debug)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    kind: Option<ApiResourceKind>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// A context with no deadline, no kind, and a fresh cancellation token.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            kind: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        // Never extend an earlier deadline.
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_kind(mut self, kind: ApiResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Derives the context for a downstream call: cancelling `self` cancels the child, the
    /// deadline carries over, and the kind is left for the downstream transport to inject.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            kind: None,
        }
    }

    pub fn kind(&self) -> Option<ApiResourceKind> {
        self.kind
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails fast when the call is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(PipelineError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Runs `fut` unless the call is cancelled or its deadline passes first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, PipelineError> {
        self.check()?;
        let deadline = self.deadline;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PipelineError::Cancelled),
            _ = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            } => Err(PipelineError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// Per-call working state handed to every step of a pipeline.
pub struct RequestContext<T> {
    call: CallContext,
    input: T,
    new_state: Option<T>,
    existing: Option<T>,
    metadata: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl<T> RequestContext<T> {
    /// Starts with `new_state` unset; a state-building step must fill it.
    pub fn new(call: CallContext, input: T) -> Self {
        Self {
            call,
            input,
            new_state: None,
            existing: None,
            metadata: HashMap::new(),
        }
    }

    pub fn call(&self) -> &CallContext {
        &self.call
    }

    pub fn input(&self) -> &T {
        &self.input
    }

    pub fn has_new_state(&self) -> bool {
        self.new_state.is_some()
    }

    pub fn new_state(&self) -> Result<&T, PipelineError> {
        self.new_state
            .as_ref()
            .ok_or(PipelineError::StateNotSet("new_state"))
    }

    pub fn new_state_mut(&mut self) -> Result<&mut T, PipelineError> {
        self.new_state
            .as_mut()
            .ok_or(PipelineError::StateNotSet("new_state"))
    }

    pub fn set_new_state(&mut self, state: T) {
        self.new_state = Some(state);
    }

    pub fn into_new_state(self) -> Result<T, PipelineError> {
        self.new_state.ok_or(PipelineError::StateNotSet("new_state"))
    }

    pub fn existing(&self) -> Result<&T, PipelineError> {
        self.existing
            .as_ref()
            .ok_or(PipelineError::StateNotSet("existing"))
    }

    pub fn existing_opt(&self) -> Option<&T> {
        self.existing.as_ref()
    }

    pub fn set_existing(&mut self, existing: T) {
        self.existing = Some(existing);
    }

    /// Stores `value` under `key`, replacing anything stored there before.
    pub fn set<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.metadata.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if present and of type `V`.
    pub fn get<V: Any + Send + Sync>(&self, key: &str) -> Option<&V> {
        self.metadata.get(key).and_then(|v| v.downcast_ref::<V>())
    }

    /// Removes and returns the value under `key`. A value of another type is left in place.
    pub fn take<V: Any + Send + Sync>(&mut self, key: &str) -> Option<V> {
        let boxed = self.metadata.remove(key)?;
        match boxed.downcast::<V>() {
            Ok(v) => Some(*v),
            Err(other) => {
                self.metadata.insert(key.to_string(), other);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }
}

impl<T: Clone> RequestContext<T> {
    /// Starts with `new_state` seeded from a clone of `input`.
    pub fn seeded(call: CallContext, input: T) -> Self {
        let mut ctx = Self::new(call, input.clone());
        ctx.new_state = Some(input);
        ctx
    }
}

impl<T: fmt::Debug> fmt::Debug for RequestContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("call", &self.call)
            .field("input", &self.input)
            .field("new_state", &self.new_state)
            .field("existing", &self.existing)
            .field("metadata_keys", &self.metadata.keys().collect::<Vec<_>>())
            .finish()
    }
}
