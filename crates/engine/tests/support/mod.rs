//! In-memory collaborators for binding tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use bindery_engine::{
    BindingError, BindingEvent, BindingId, BindingRegistry, Cache, CacheFactory, CacheRef, ChangeListener, Context, ContextBinding,
    DataRequestedCallback, DeleteCallback, DependentBinding, ErrorReporter, JsonMetaModel, ListenerRef, MetaModel, ModelHandle,
    SyncPromise, SyncResult,
};
use bindery_types::{BindingParameters, ModelConfig, QueryOptions};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::oneshot;

pub fn metadata() -> JsonMetaModel {
    JsonMetaModel::from_json_str(include_str!("../data/metadata.json")).expect("metadata fixture")
}

/// Metadata fixture that remembers every lookup.
pub struct CountingMetaModel {
    inner: JsonMetaModel,
    lookups: Mutex<Vec<String>>,
}

impl Default for CountingMetaModel {
    fn default() -> Self {
        Self {
            inner: metadata(),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

impl CountingMetaModel {
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock").clone()
    }
}

impl MetaModel for CountingMetaModel {
    fn fetch_object(&self, path: &str) -> SyncPromise<Option<Value>> {
        self.lookups.lock().expect("lookups lock").push(path.to_string());
        self.inner.fetch_object(path)
    }
}

/// Polls `condition` until it holds, letting spawned work run in between.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    condition()
}

pub fn parameters(value: Value) -> BindingParameters {
    serde_json::from_value(value).expect("binding parameters")
}

/// What the next cache call answers with.
pub enum Response {
    /// Served from the cache; no request is sent.
    Cached(Value),
    /// Sent to the service and answered.
    Remote(Value),
    /// Sent to the service and failed.
    Fail(BindingError),
    /// Sent to the service; answered once the sender fires.
    Pending(oneshot::Receiver<SyncResult<Value>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Fetch {
        group_id: String,
        path: String,
    },
    Post {
        group_id: String,
        body: IndexMap<String, Value>,
        etag: Option<String>,
    },
    Delete {
        group_id: String,
        edit_url: String,
        path: String,
    },
}

#[derive(Default)]
struct FactoryShared {
    caches: Mutex<Vec<Arc<FakeCache>>>,
    responses: Mutex<VecDeque<Response>>,
}

impl FactoryShared {
    fn next_response(&self) -> Response {
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(Response::Cached(Value::Object(Default::default())))
    }
}

#[derive(Default, Clone)]
pub struct FakeCacheFactory {
    shared: Arc<FactoryShared>,
}

impl FakeCacheFactory {
    pub fn respond(&self, response: Response) {
        self.shared.responses.lock().expect("responses lock").push_back(response);
    }

    /// Queues a pending response and returns the sender that settles it.
    pub fn respond_later(&self) -> oneshot::Sender<SyncResult<Value>> {
        let (sender, receiver) = oneshot::channel();
        self.respond(Response::Pending(receiver));
        sender
    }

    pub fn caches(&self) -> Vec<Arc<FakeCache>> {
        self.shared.caches.lock().expect("caches lock").clone()
    }

    pub fn cache_count(&self) -> usize {
        self.shared.caches.lock().expect("caches lock").len()
    }

    pub fn last_cache(&self) -> Arc<FakeCache> {
        self.caches().last().cloned().expect("a cache was created")
    }
}

impl CacheFactory for FakeCacheFactory {
    fn create_single(&self, resource_path: &str, query_options: &QueryOptions, auto_expand_select: bool, post: bool) -> CacheRef {
        let cache = Arc::new(FakeCache {
            resource_path: resource_path.to_string(),
            query_options: query_options.clone(),
            auto_expand_select,
            post,
            shared: Arc::clone(&self.shared),
            requests: Mutex::new(Vec::new()),
            deregistered: Mutex::new(Vec::new()),
            pending_changes: AtomicBool::new(false),
            resets: AtomicUsize::new(0),
        });
        self.shared.caches.lock().expect("caches lock").push(Arc::clone(&cache));
        cache
    }
}

pub struct FakeCache {
    pub resource_path: String,
    pub query_options: QueryOptions,
    pub auto_expand_select: bool,
    pub post: bool,
    shared: Arc<FactoryShared>,
    requests: Mutex<Vec<Request>>,
    deregistered: Mutex<Vec<String>>,
    pending_changes: AtomicBool,
    resets: AtomicUsize,
}

impl std::fmt::Debug for FakeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeCache").field("resource_path", &self.resource_path).finish()
    }
}

impl FakeCache {
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn deregistered(&self) -> Vec<String> {
        self.deregistered.lock().expect("deregistered lock").clone()
    }

    pub fn set_pending_changes(&self, pending: bool) {
        self.pending_changes.store(pending, Ordering::SeqCst);
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn record(&self, request: Request) {
        self.requests.lock().expect("requests lock").push(request);
    }

    fn answer(&self, on_request: impl FnOnce()) -> SyncPromise<Value> {
        match self.shared.next_response() {
            Response::Cached(value) => SyncPromise::resolve(value),
            Response::Remote(value) => {
                on_request();
                SyncPromise::resolve(value)
            }
            Response::Fail(error) => {
                on_request();
                SyncPromise::reject(error)
            }
            Response::Pending(receiver) => {
                on_request();
                SyncPromise::from_future(async move {
                    receiver
                        .await
                        .unwrap_or_else(|_| Err(BindingError::canceled("response sender dropped")))
                })
            }
        }
    }
}

impl Cache for FakeCache {
    fn resource_path(&self) -> &str {
        &self.resource_path
    }

    fn fetch_value(
        &self,
        group_id: &str,
        path: &str,
        on_data_requested: DataRequestedCallback,
        _listener: Option<ListenerRef>,
    ) -> SyncPromise<Value> {
        self.record(Request::Fetch {
            group_id: group_id.to_string(),
            path: path.to_string(),
        });
        self.answer(on_data_requested)
    }

    fn post(&self, group_id: &str, body: &IndexMap<String, Value>, etag: Option<&str>) -> SyncPromise<Value> {
        self.record(Request::Post {
            group_id: group_id.to_string(),
            body: body.clone(),
            etag: etag.map(str::to_string),
        });
        self.answer(|| {})
    }

    fn deregister_change(&self, path: &str, _listener: &ListenerRef) {
        self.deregistered.lock().expect("deregistered lock").push(path.to_string());
    }

    fn has_pending_changes_for_path(&self, _path: &str) -> bool {
        self.pending_changes.load(Ordering::SeqCst)
    }

    fn reset_changes_for_path(&self, _path: &str) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn delete(&self, group_id: &str, edit_url: &str, path: &str, on_success: DeleteCallback) -> SyncPromise<()> {
        self.record(Request::Delete {
            group_id: group_id.to_string(),
            edit_url: edit_url.to_string(),
            path: path.to_string(),
        });
        self.answer(|| {}).map(move |_| on_success())
    }
}

/// A parent context with configurable behavior.
#[derive(Debug)]
pub struct FakeContext {
    path: String,
    has_binding: bool,
    transient: bool,
    supports_delete: bool,
    entity: Option<Value>,
    canonical_path: Mutex<Option<SyncPromise<String>>>,
    pub fetched: Mutex<Vec<(String, Option<String>)>>,
    pub object_requests: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<Option<String>>>,
    pub deleted_from_cache: Mutex<Vec<(Option<String>, String, String)>>,
    pub deregistered: Mutex<Vec<String>>,
    destroyed: AtomicBool,
}

impl FakeContext {
    /// A context owned by some binding, e.g. the element context of an entity binding.
    pub fn bound(path: &str) -> Self {
        Self {
            path: path.to_string(),
            has_binding: true,
            transient: false,
            supports_delete: false,
            entity: None,
            canonical_path: Mutex::new(None),
            fetched: Mutex::new(Vec::new()),
            object_requests: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            deleted_from_cache: Mutex::new(Vec::new()),
            deregistered: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// A base context created directly by the model.
    pub fn base(path: &str) -> Self {
        Self {
            has_binding: false,
            ..Self::bound(path)
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn deletable(mut self) -> Self {
        self.supports_delete = true;
        self
    }

    pub fn with_entity(mut self, entity: Value) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_canonical_path(self, canonical_path: SyncPromise<String>) -> Self {
        *self.canonical_path.lock().expect("canonical lock") = Some(canonical_path);
        self
    }

    pub fn shared(self) -> Arc<FakeContext> {
        Arc::new(self)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Context for FakeContext {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn has_binding(&self) -> bool {
        self.has_binding
    }

    fn is_transient(&self) -> bool {
        self.transient
    }

    fn fetch_canonical_path(&self) -> SyncPromise<String> {
        self.canonical_path
            .lock()
            .expect("canonical lock")
            .clone()
            .unwrap_or_else(|| SyncPromise::resolve(self.path.clone()))
    }

    fn fetch_value(&self, path: &str, _listener: Option<ListenerRef>, group_id: Option<&str>) -> SyncPromise<Option<Value>> {
        self.fetched
            .lock()
            .expect("fetched lock")
            .push((path.to_string(), group_id.map(str::to_string)));
        SyncPromise::resolve(Some(Value::String(format!("value of {}", path))))
    }

    fn object(&self, path: &str) -> Option<Value> {
        self.object_requests.lock().expect("object lock").push(path.to_string());
        self.entity.clone()
    }

    fn deregister_change(&self, path: &str, _listener: &ListenerRef) {
        self.deregistered.lock().expect("deregistered lock").push(path.to_string());
    }

    fn supports_delete(&self) -> bool {
        self.supports_delete
    }

    fn delete(&self, group_id: Option<&str>) -> SyncResult<SyncPromise<()>> {
        self.deleted.lock().expect("deleted lock").push(group_id.map(str::to_string));
        Ok(SyncPromise::resolve(()))
    }

    fn delete_from_cache(
        &self,
        group_id: Option<&str>,
        edit_url: &str,
        path: &str,
        on_success: DeleteCallback,
    ) -> SyncResult<SyncPromise<()>> {
        self.deleted_from_cache.lock().expect("deleted lock").push((
            group_id.map(str::to_string),
            edit_url.to_string(),
            path.to_string(),
        ));
        on_success();
        Ok(SyncPromise::resolve(()))
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// A dependent binding that records what it was asked to do.
#[derive(Default)]
pub struct RecordingDependent {
    pub refreshes: Mutex<Vec<(Option<String>, bool)>>,
    pub checks: AtomicUsize,
    pub resets: AtomicUsize,
    pub pending_changes: AtomicBool,
    pub failure: Mutex<Option<BindingError>>,
}

impl RecordingDependent {
    pub fn refreshes(&self) -> Vec<(Option<String>, bool)> {
        self.refreshes.lock().expect("refreshes lock").clone()
    }

    pub fn fail_with(&self, error: BindingError) {
        *self.failure.lock().expect("failure lock") = Some(error);
    }
}

impl DependentBinding for RecordingDependent {
    fn refresh_internal(&self, group_id: Option<&str>, check_update: bool) -> SyncPromise<()> {
        self.refreshes
            .lock()
            .expect("refreshes lock")
            .push((group_id.map(str::to_string), check_update));
        match self.failure.lock().expect("failure lock").clone() {
            Some(error) => SyncPromise::reject(error),
            None => SyncPromise::resolve(()),
        }
    }

    fn check_update(&self) {
        self.checks.fetch_add(1, Ordering::SeqCst);
    }

    fn has_pending_changes(&self) -> bool {
        self.pending_changes.load(Ordering::SeqCst)
    }

    fn reset_changes(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    dependents: Mutex<HashMap<BindingId, Vec<Arc<dyn DependentBinding>>>>,
    pub created: Mutex<Vec<BindingId>>,
    pub destroyed: Mutex<Vec<BindingId>>,
}

impl FakeRegistry {
    pub fn add_dependent(&self, parent: BindingId, dependent: Arc<dyn DependentBinding>) {
        self.dependents
            .lock()
            .expect("dependents lock")
            .entry(parent)
            .or_default()
            .push(dependent);
    }
}

impl BindingRegistry for FakeRegistry {
    fn binding_created(&self, binding: &ContextBinding) {
        self.created.lock().expect("created lock").push(binding.id());
    }

    fn binding_destroyed(&self, binding_id: BindingId) {
        self.destroyed.lock().expect("destroyed lock").push(binding_id);
    }

    fn dependent_bindings(&self, binding_id: BindingId) -> Vec<Arc<dyn DependentBinding>> {
        self.dependents
            .lock()
            .expect("dependents lock")
            .get(&binding_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, String, BindingError)>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .lock()
            .expect("reports lock")
            .iter()
            .map(|(message, _, _)| message.clone())
            .collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, message: &str, class_name: &str, error: &BindingError) {
        self.reports
            .lock()
            .expect("reports lock")
            .push((message.to_string(), class_name.to_string(), error.clone()));
    }
}

#[derive(Debug)]
pub struct NoopListener;

impl ChangeListener for NoopListener {
    fn on_change(&self, _value: &Value) {}
}

pub fn listener() -> ListenerRef {
    Arc::new(NoopListener)
}

/// Routes engine logs to the test harness; `RUST_LOG=bindery_engine=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
        .with_test_writer()
        .try_init();
}

/// A model wired to in-memory collaborators.
pub struct Fixture {
    pub model: ModelHandle,
    pub meta_model: Arc<CountingMetaModel>,
    pub caches: FakeCacheFactory,
    pub registry: Arc<FakeRegistry>,
    pub reporter: Arc<RecordingReporter>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        init_tracing();
        let caches = FakeCacheFactory::default();
        let registry = Arc::new(FakeRegistry::default());
        let reporter = Arc::new(RecordingReporter::default());
        let meta_model = Arc::new(CountingMetaModel::default());
        let model = ModelHandle::new(config, meta_model.clone(), Arc::new(caches.clone()))
            .expect("valid config")
            .with_registry(registry.clone())
            .with_error_reporter(reporter.clone());
        Self {
            model,
            meta_model,
            caches,
            registry,
            reporter,
        }
    }

    pub fn bind(&self, path: &str, context: Option<Arc<FakeContext>>) -> ContextBinding {
        self.bind_with(path, context, BindingParameters::new())
    }

    pub fn bind_with(&self, path: &str, context: Option<Arc<FakeContext>>, parameters: BindingParameters) -> ContextBinding {
        ContextBinding::new(self.model.clone(), path, context.map(|context| context as Arc<dyn Context>), parameters).expect("binding")
    }

    pub fn add_dependent(&self, binding: &ContextBinding) -> Arc<RecordingDependent> {
        let dependent = Arc::new(RecordingDependent::default());
        self.registry.add_dependent(binding.id(), dependent.clone());
        dependent
    }
}

/// Records every supported event of `binding`.
pub fn record_events(binding: &ContextBinding) -> Arc<Mutex<Vec<BindingEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for name in ["change", "dataRequested", "dataReceived"] {
        let sink = Arc::clone(&events);
        binding
            .attach_event(
                name,
                Arc::new(move |event: &BindingEvent| sink.lock().expect("events lock").push(event.clone())),
            )
            .expect("supported event");
    }
    events
}

pub fn take_events(events: &Arc<Mutex<Vec<BindingEvent>>>) -> Vec<BindingEvent> {
    std::mem::take(&mut *events.lock().expect("events lock"))
}
