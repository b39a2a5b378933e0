//! # Pipeline Engine
//!
//! A [`Pipeline<T>`] is an immutable, named, ordered list of [`Step<T>`]s. Controllers build one
//! per operation (create, update, delete, get, get-by-reference, apply) and reuse it for every
//! request.
//!
//! ## Execution
//!
//! [`Pipeline::execute`] runs the steps in declared order against one [`RequestContext`]. The
//! first step to fail stops the run, and its error is returned exactly as the step produced it.
//! Later steps never run. Storage writes made by earlier steps are not rolled back.
//!
//! The call's cancellation and deadline are checked before every step, and storage-touching
//! steps race their I/O against them through [`CallContext::guard`](crate::CallContext::guard).
//!
//! ## Build-time validation
//!
//! Steps declare which request slots they read and which they fill ([`StepContract`]).
//! [`PipelineBuilder::build`] walks the steps in order and refuses to build a pipeline in which
//! a step reads a slot no earlier step (or the input seed) fills. A controller that forgets its
//! state-building step fails when it is constructed, not on the first request.
//!
//! ```
//! use async_trait::async_trait;
//! use resource_pipeline::{PipelineBuilder, PipelineError, RequestContext, Slot, Step, StepContract};
//!
//! struct Shout;
//!
//! #[async_trait]
//! impl Step<String> for Shout {
//!     fn name(&self) -> &'static str { "Shout" }
//!     fn contract(&self) -> StepContract { StepContract::reads(&[Slot::NewState]) }
//!     async fn execute(&self, ctx: &mut RequestContext<String>) -> Result<(), PipelineError> {
//!         let upper = ctx.new_state()?.to_uppercase();
//!         ctx.set_new_state(upper);
//!         Ok(())
//!     }
//! }
//!
//! // Reading new_state without a seed is rejected up front.
//! assert!(PipelineBuilder::new("shout").add_step(Shout).build().is_err());
//! assert!(PipelineBuilder::new("shout").seed_from_input().add_step(Shout).build().is_ok());
//! ```

use crate::context::RequestContext;
use crate::error::PipelineError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, warn, Instrument};

/// A request slot a step can read or fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    NewState,
    Existing,
    /// The bare id extracted into the metadata bag.
    ResourceId,
}

impl Slot {
    fn describe(self) -> &'static str {
        match self {
            Slot::NewState => "new_state",
            Slot::Existing => "existing",
            Slot::ResourceId => "resource_id",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Slots a step reads (`requires`) and fills (`provides`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContract {
    pub requires: &'static [Slot],
    pub provides: &'static [Slot],
}

impl StepContract {
    pub const fn new(requires: &'static [Slot], provides: &'static [Slot]) -> Self {
        Self { requires, provides }
    }

    pub const fn reads(requires: &'static [Slot]) -> Self {
        Self::new(requires, &[])
    }

    pub const fn fills(provides: &'static [Slot]) -> Self {
        Self::new(&[], provides)
    }
}

/// A single unit of pipeline behavior.
#[async_trait]
pub trait Step<T: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    fn contract(&self) -> StepContract {
        StepContract::default()
    }

    async fn execute(&self, ctx: &mut RequestContext<T>) -> Result<(), PipelineError>;
}

pub struct Pipeline<T: Send + Sync + 'static> {
    name: String,
    seed_from_input: bool,
    steps: Vec<Arc<dyn Step<T>>>,
}

impl<T: Send + Sync + 'static> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("seed_from_input", &self.seed_from_input)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Pipeline<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    /// Runs every step in order, stopping at the first error.
    pub async fn execute(&self, ctx: &mut RequestContext<T>) -> Result<(), PipelineError> {
        let span = debug_span!("pipeline", name = %self.name);
        async {
            if self.seed_from_input && !ctx.has_new_state() {
                let seed = ctx.input().clone();
                ctx.set_new_state(seed);
            }

            let started = Instant::now();
            debug!(steps = self.steps.len(), "Pipeline started");

            for step in &self.steps {
                ctx.call().check()?;

                let step_started = Instant::now();
                let result = step
                    .execute(ctx)
                    .instrument(debug_span!("step", step = step.name()))
                    .await;

                if let Err(e) = result {
                    warn!(
                        pipeline = %self.name,
                        step = step.name(),
                        error = %e,
                        elapsed_us = step_started.elapsed().as_micros() as u64,
                        "Step failed"
                    );
                    return Err(e);
                }
                debug!(
                    step = step.name(),
                    elapsed_us = step_started.elapsed().as_micros() as u64,
                    "Step ok"
                );
            }

            debug!(
                elapsed_us = started.elapsed().as_micros() as u64,
                "Pipeline completed"
            );
            Ok::<(), PipelineError>(())
        }
        .instrument(span)
        .await
    }
}

pub struct PipelineBuilder<T: Send + Sync + 'static> {
    name: String,
    seed_from_input: bool,
    steps: Vec<Arc<dyn Step<T>>>,
}

impl<T: Send + Sync + 'static> PipelineBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed_from_input: false,
            steps: Vec::new(),
        }
    }

    /// Starts every run with `new_state` cloned from the input.
    pub fn seed_from_input(mut self) -> Self {
        self.seed_from_input = true;
        self
    }

    pub fn add_step(self, step: impl Step<T> + 'static) -> Self {
        self.add_shared(Arc::new(step))
    }

    /// Adds a step that is shared with other pipelines.
    pub fn add_shared(mut self, step: Arc<dyn Step<T>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates slot order and freezes the pipeline.
    pub fn build(self) -> Result<Pipeline<T>, PipelineError> {
        let mut filled: Vec<Slot> = Vec::new();
        if self.seed_from_input {
            filled.push(Slot::NewState);
        }

        for step in &self.steps {
            let contract = step.contract();
            if let Some(missing) = contract.requires.iter().find(|s| !filled.contains(*s)) {
                return Err(PipelineError::Misconfigured {
                    pipeline: self.name.clone(),
                    step: step.name(),
                    requirement: missing.describe(),
                });
            }
            filled.extend(contract.provides.iter().copied());
        }

        debug!(pipeline = %self.name, steps = self.steps.len(), "Pipeline built");
        Ok(Pipeline {
            name: self.name,
            seed_from_input: self.seed_from_input,
            steps: self.steps,
        })
    }
}
