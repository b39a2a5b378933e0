//! # Mocks & Testing Guide
//!
//! Test doubles for the three seams a pipeline talks through.
//!
//! | Double | Stands in for | Typical use |
//! |---|---|---|
//! | [`MockDomainClient`] | another domain's controller | custom steps that create or update child resources |
//! | [`FlakyStore`] | a [`ResourceStore`] | storage failures and slow I/O (cancellation, deadlines) |
//! | [`RecordingStep`] | any [`Step`] | ordering and short-circuit checks |
//!
//! ## Testing Strategies
//!
//! <details>
//! <summary><b>Pattern 0: Step logic with a mocked downstream domain</b></summary>
//!
//! ```rust,ignore
//! let mut instances = MockDomainClient::<AgentInstance>::new();
//! instances.expect_create().return_ok(instance);
//!
//! let client = AgentInstanceClient::new(Arc::new(instances.clone()));
//! let step = CreateDefaultInstanceStep::new(client);
//! step.execute(&mut ctx).await?;
//!
//! instances.verify(); // every expectation consumed
//! ```
//! </details>
//!
//! <details>
//! <summary><b>Pattern 1: A pipeline against an in-memory store</b></summary>
//!
//! Build the controller on a [`MemoryStore`](crate::store::MemoryStore) and call it directly.
//! No server task is needed.
//! </details>
//!
//! <details>
//! <summary><b>Pattern 2: The whole daemon</b></summary>
//!
//! Start the daemon with its default configuration and talk to it through its clients. See
//! the daemon crate's `tests/` directory.
//! </details>

use crate::client::DomainClient;
use crate::context::{CallContext, RequestContext};
use crate::error::{PipelineError, StoreError};
use crate::pipeline::{Step, StepContract};
use crate::resource::{ApiResource, ResourceId};
use crate::store::ResourceStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// DOMAIN CLIENT
// =============================================================================

enum Expectation<R> {
    Create { response: Result<R, PipelineError> },
    Get { id: String, response: Result<R, PipelineError> },
    Update { response: Result<R, PipelineError> },
}

impl<R> Expectation<R> {
    fn describe(&self) -> String {
        match self {
            Expectation::Create { .. } => "create".to_string(),
            Expectation::Get { id, .. } => format!("get({id})"),
            Expectation::Update { .. } => "update".to_string(),
        }
    }
}

/// A [`DomainClient`] answering from a queue of expectations.
///
/// Expectations are consumed in order. A call that does not match the next expectation
/// panics, as does [`verify`](MockDomainClient::verify) when some are left over. Every
/// resource passed to `create` and `update` is recorded for later assertions.
///
/// ```
/// # use resource_pipeline::mock::MockDomainClient;
/// # use resource_pipeline::PipelineError;
/// # #[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// # struct Doc { type_meta: resource_pipeline::TypeMeta, metadata: resource_pipeline::ObjectMeta }
/// # impl resource_pipeline::ApiResource for Doc {
/// #     const API_VERSION: &'static str = "test/v1";
/// #     fn type_meta(&self) -> &resource_pipeline::TypeMeta { &self.type_meta }
/// #     fn type_meta_mut(&mut self) -> &mut resource_pipeline::TypeMeta { &mut self.type_meta }
/// #     fn metadata(&self) -> &resource_pipeline::ObjectMeta { &self.metadata }
/// #     fn metadata_mut(&mut self) -> &mut resource_pipeline::ObjectMeta { &mut self.metadata }
/// #     fn merge_from(&mut self, _: &Self) {}
/// # }
/// let mut mock = MockDomainClient::<Doc>::new();
/// mock.expect_get("doc-1").return_err(PipelineError::not_found("Doc", "doc-1"));
/// assert_eq!(mock.remaining(), 1);
/// ```
pub struct MockDomainClient<R> {
    expectations: Arc<Mutex<VecDeque<Expectation<R>>>>,
    received: Arc<Mutex<Vec<R>>>,
}

impl<R> Clone for MockDomainClient<R> {
    fn clone(&self) -> Self {
        Self {
            expectations: self.expectations.clone(),
            received: self.received.clone(),
        }
    }
}

impl<R: ApiResource> Default for MockDomainClient<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ApiResource> MockDomainClient<R> {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_create(&mut self) -> ExpectationBuilder<R> {
        ExpectationBuilder {
            op: Op::Create,
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_get(&mut self, id: impl Into<String>) -> ExpectationBuilder<R> {
        ExpectationBuilder {
            op: Op::Get(id.into()),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_update(&mut self) -> ExpectationBuilder<R> {
        ExpectationBuilder {
            op: Op::Update,
            expectations: self.expectations.clone(),
        }
    }

    /// Resources passed to `create` and `update`, in call order.
    pub fn received(&self) -> Vec<R> {
        lock(&self.received).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.expectations).len()
    }

    /// Panics if any expectation was not consumed.
    pub fn verify(&self) {
        let exps = lock(&self.expectations);
        if !exps.is_empty() {
            let pending: Vec<String> = exps.iter().map(Expectation::describe).collect();
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                exps.len(),
                pending
            );
        }
    }

    fn next(&self, call: &str) -> Expectation<R> {
        match lock(&self.expectations).pop_front() {
            Some(exp) => exp,
            None => panic!("Unexpected {call} call: no expectations left"),
        }
    }
}

#[async_trait]
impl<R: ApiResource> DomainClient<R> for MockDomainClient<R> {
    async fn create(&self, _call: &CallContext, resource: R) -> Result<R, PipelineError> {
        lock(&self.received).push(resource);
        match self.next("create") {
            Expectation::Create { response } => response,
            other => panic!("Expected {}, got create", other.describe()),
        }
    }

    async fn get(&self, _call: &CallContext, id: ResourceId) -> Result<R, PipelineError> {
        match self.next("get") {
            Expectation::Get {
                id: expected,
                response,
            } => {
                assert_eq!(expected, id.value, "get called with unexpected id");
                response
            }
            other => panic!("Expected {}, got get({id})", other.describe()),
        }
    }

    async fn update(&self, _call: &CallContext, resource: R) -> Result<R, PipelineError> {
        lock(&self.received).push(resource);
        match self.next("update") {
            Expectation::Update { response } => response,
            other => panic!("Expected {}, got update", other.describe()),
        }
    }
}

enum Op {
    Create,
    Get(String),
    Update,
}

/// Completes an expectation with its response.
pub struct ExpectationBuilder<R> {
    op: Op,
    expectations: Arc<Mutex<VecDeque<Expectation<R>>>>,
}

impl<R> ExpectationBuilder<R> {
    pub fn return_ok(self, value: R) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: PipelineError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<R, PipelineError>) {
        let exp = match self.op {
            Op::Create => Expectation::Create { response },
            Op::Get(id) => Expectation::Get { id, response },
            Op::Update => Expectation::Update { response },
        };
        lock(&self.expectations).push_back(exp);
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Default)]
struct Faults {
    put: Option<StoreError>,
    get: Option<StoreError>,
    delete: Option<StoreError>,
    list: Option<StoreError>,
}

/// Wraps a store and fails or delays selected operations.
///
/// Each `fail_next_*` arms a single failure, consumed by the next call of that operation.
pub struct FlakyStore {
    inner: Arc<dyn ResourceStore>,
    faults: Mutex<Faults>,
    delay: Mutex<Option<Duration>>,
    puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            delay: Mutex::new(None),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_put(&self, error: StoreError) {
        lock(&self.faults).put = Some(error);
    }

    pub fn fail_next_get(&self, error: StoreError) {
        lock(&self.faults).get = Some(error);
    }

    pub fn fail_next_delete(&self, error: StoreError) {
        lock(&self.faults).delete = Some(error);
    }

    pub fn fail_next_list(&self, error: StoreError) {
        lock(&self.faults).list = Some(error);
    }

    /// Sleeps for `delay` before every operation.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Successful puts so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ResourceStore for FlakyStore {
    async fn put(&self, kind: &str, id: &str, value: Bytes) -> Result<(), StoreError> {
        self.pause().await;
        let fault = lock(&self.faults).put.take();
        if let Some(e) = fault {
            return Err(e);
        }
        self.inner.put(kind, id, value).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Bytes, StoreError> {
        self.pause().await;
        let fault = lock(&self.faults).get.take();
        match fault {
            Some(e) => Err(e),
            None => self.inner.get(kind, id).await,
        }
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        self.pause().await;
        let fault = lock(&self.faults).delete.take();
        match fault {
            Some(e) => Err(e),
            None => self.inner.delete(kind, id).await,
        }
    }

    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Bytes>, StoreError> {
        self.pause().await;
        let fault = lock(&self.faults).list.take();
        match fault {
            Some(e) => Err(e),
            None => self.inner.list_by_kind(kind).await,
        }
    }

    async fn delete_by_kind(&self, kind: &str) -> Result<usize, StoreError> {
        self.pause().await;
        self.inner.delete_by_kind(kind).await
    }
}

// =============================================================================
// STEP
// =============================================================================

/// A step that counts its executions and optionally fails.
pub struct RecordingStep {
    name: &'static str,
    calls: Arc<AtomicUsize>,
    failure: Option<PipelineError>,
    contract: StepContract,
}

impl RecordingStep {
    pub fn ok(name: &'static str) -> Self {
        Self {
            name,
            calls: Arc::new(AtomicUsize::new(0)),
            failure: None,
            contract: StepContract::default(),
        }
    }

    pub fn failing(name: &'static str, error: PipelineError) -> Self {
        Self {
            failure: Some(error),
            ..Self::ok(name)
        }
    }

    pub fn with_contract(mut self, contract: StepContract) -> Self {
        self.contract = contract;
        self
    }

    /// Shared counter; stays valid after the step is moved into a pipeline.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Step<T> for RecordingStep {
    fn name(&self) -> &'static str {
        self.name
    }

    fn contract(&self) -> StepContract {
        self.contract
    }

    async fn execute(&self, _ctx: &mut RequestContext<T>) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
