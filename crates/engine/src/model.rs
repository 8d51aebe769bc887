//! Collaborator interfaces of a binding and the model handle that bundles them.
//!
//! A binding never talks to the network or parses payloads. It reaches the outside world
//! only through the traits in this module:
//!
//! - [`Context`]: the parent context a relative binding resolves against
//! - [`Cache`] / [`CacheFactory`]: the data cache for one entity or operation result
//! - [`MetaModel`]: lookup of operation definitions
//! - [`ContextFactory`]: creation of element contexts
//! - [`BindingRegistry`]: the owning model's list of bindings and their dependents
//! - [`ErrorReporter`]: the central error sink

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bindery_types::{BindingParameters, ConfigError, ModelConfig, QueryOptions, validate_group_id};
use bindery_util::{build_query_options, resolve_path};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    binding::ContextBinding,
    context::BoundContextFactory,
    error::{BindingError, SyncResult},
    promise::SyncPromise,
};

/// Receives value changes for a path registered at a cache.
pub trait ChangeListener: Send + Sync + fmt::Debug {
    fn on_change(&self, value: &Value);
}

pub type ListenerRef = Arc<dyn ChangeListener>;
pub type ContextRef = Arc<dyn Context>;
pub type CacheRef = Arc<dyn Cache>;

/// Called by a cache right before it sends a request.
pub type DataRequestedCallback = Box<dyn FnOnce() + Send>;

/// Called by a cache once a deletion is confirmed by the service.
pub type DeleteCallback = Box<dyn FnOnce() + Send>;

/// A context a binding can be resolved against.
///
/// Contexts created by a binding (`has_binding() == true`) know their canonical path and
/// can serve values. A plain base context created directly by the model only has a path.
pub trait Context: Send + Sync + fmt::Debug {
    fn path(&self) -> String;

    /// Whether this context belongs to a binding.
    fn has_binding(&self) -> bool {
        true
    }

    /// Whether the context represents an entity that is not yet persisted.
    fn is_transient(&self) -> bool {
        false
    }

    fn fetch_canonical_path(&self) -> SyncPromise<String> {
        SyncPromise::resolve(self.path())
    }

    /// Reads the value at `path`, absolute or relative to this context.
    fn fetch_value(&self, _path: &str, _listener: Option<ListenerRef>, _group_id: Option<&str>) -> SyncPromise<Option<Value>> {
        SyncPromise::resolve(None)
    }

    /// Synchronous read of already available data; `None` if nothing is loaded.
    fn object(&self, _path: &str) -> Option<Value> {
        None
    }

    fn deregister_change(&self, _path: &str, _listener: &ListenerRef) {}

    fn supports_delete(&self) -> bool {
        false
    }

    /// Deletes the entity this context points to.
    fn delete(&self, _group_id: Option<&str>) -> SyncResult<SyncPromise<()>> {
        Err(BindingError::DeleteNotAllowed { path: self.path() })
    }

    /// Deletes the entity at `path` below this context through the owning binding's cache.
    fn delete_from_cache(
        &self,
        _group_id: Option<&str>,
        _edit_url: &str,
        path: &str,
        _on_success: DeleteCallback,
    ) -> SyncResult<SyncPromise<()>> {
        Err(BindingError::DeleteNotAllowed { path: path.to_string() })
    }

    fn destroy(&self) {}
}

/// Data cache for a single entity or a single operation result.
pub trait Cache: Send + Sync + fmt::Debug {
    fn resource_path(&self) -> &str;

    /// Reads the value at `path` relative to the cached resource. `on_data_requested` is
    /// called only if a request has to be sent.
    fn fetch_value(
        &self,
        group_id: &str,
        path: &str,
        on_data_requested: DataRequestedCallback,
        listener: Option<ListenerRef>,
    ) -> SyncPromise<Value>;

    /// Invokes an action with the given body. `etag` is sent as `If-Match` when present.
    fn post(&self, group_id: &str, body: &IndexMap<String, Value>, etag: Option<&str>) -> SyncPromise<Value>;

    fn deregister_change(&self, path: &str, listener: &ListenerRef);

    fn has_pending_changes_for_path(&self, path: &str) -> bool;

    fn reset_changes_for_path(&self, path: &str);

    fn delete(&self, group_id: &str, edit_url: &str, path: &str, on_success: DeleteCallback) -> SyncPromise<()>;
}

pub trait CacheFactory: Send + Sync {
    /// Creates a cache for one entity or operation result. `post` marks a cache used to
    /// invoke an action.
    fn create_single(&self, resource_path: &str, query_options: &QueryOptions, auto_expand_select: bool, post: bool) -> CacheRef;
}

/// Lookup into the metadata document, e.g. `/name.space.Confirm` or `/GetCount`.
pub trait MetaModel: Send + Sync {
    fn fetch_object(&self, path: &str) -> SyncPromise<Option<Value>>;
}

pub trait ContextFactory: Send + Sync {
    fn create(&self, binding: &ContextBinding, path: &str) -> ContextRef;
}

/// Something that hangs below a binding and is refreshed with it.
pub trait DependentBinding: Send + Sync {
    fn refresh_internal(&self, group_id: Option<&str>, check_update: bool) -> SyncPromise<()>;

    fn check_update(&self) {}

    fn has_pending_changes(&self) -> bool {
        false
    }

    fn reset_changes(&self) {}
}

pub trait BindingRegistry: Send + Sync {
    fn binding_created(&self, _binding: &ContextBinding) {}

    fn binding_destroyed(&self, _binding_id: BindingId) {}

    fn dependent_bindings(&self, binding_id: BindingId) -> Vec<Arc<dyn DependentBinding>>;
}

pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str, class_name: &str, error: &BindingError);
}

/// Registry without dependents.
#[derive(Debug, Default)]
pub struct NoDependents;

impl BindingRegistry for NoDependents {
    fn dependent_bindings(&self, _binding_id: BindingId) -> Vec<Arc<dyn DependentBinding>> {
        Vec::new()
    }
}

/// Reports errors to the log. Canceled requests are logged at debug level only.
#[derive(Debug, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, message: &str, class_name: &str, reported: &BindingError) {
        if reported.is_canceled() {
            debug!(class = class_name, error = %reported, "{}", message);
        } else {
            error!(class = class_name, error = %reported, "{}", message);
        }
    }
}

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique binding identity used by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The owning model as seen by its bindings.
#[derive(Clone)]
pub struct ModelHandle {
    config: Arc<ModelConfig>,
    meta_model: Arc<dyn MetaModel>,
    cache_factory: Arc<dyn CacheFactory>,
    context_factory: Arc<dyn ContextFactory>,
    registry: Arc<dyn BindingRegistry>,
    reporter: Arc<dyn ErrorReporter>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle").field("config", &self.config).finish()
    }
}

impl ModelHandle {
    /// Creates a model handle with element contexts from [`BoundContextFactory`], no
    /// dependents, and errors reported to the log.
    pub fn new(config: ModelConfig, meta_model: Arc<dyn MetaModel>, cache_factory: Arc<dyn CacheFactory>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            meta_model,
            cache_factory,
            context_factory: Arc::new(BoundContextFactory),
            registry: Arc::new(NoDependents),
            reporter: Arc::new(TracingErrorReporter),
        })
    }

    pub fn with_context_factory(mut self, context_factory: Arc<dyn ContextFactory>) -> Self {
        self.context_factory = context_factory;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn BindingRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }

    pub fn update_group_id(&self) -> &str {
        &self.config.update_group_id
    }

    /// Resolves a binding path against an optional context.
    pub fn resolve(&self, path: &str, context: Option<&ContextRef>) -> Option<String> {
        let context_path = context.map(|context| context.path());
        resolve_path(path, context_path.as_deref())
    }

    pub fn check_group_id(&self, group_id: Option<&str>) -> SyncResult<()> {
        validate_group_id(group_id)?;
        Ok(())
    }

    pub fn build_query_options(&self, parameters: &BindingParameters) -> SyncResult<QueryOptions> {
        Ok(build_query_options(parameters, true)?)
    }

    pub(crate) fn meta_model(&self) -> &Arc<dyn MetaModel> {
        &self.meta_model
    }

    pub(crate) fn cache_factory(&self) -> &Arc<dyn CacheFactory> {
        &self.cache_factory
    }

    pub(crate) fn create_context(&self, binding: &ContextBinding, path: &str) -> ContextRef {
        self.context_factory.create(binding, path)
    }

    pub(crate) fn binding_created(&self, binding: &ContextBinding) {
        self.registry.binding_created(binding);
    }

    pub(crate) fn binding_destroyed(&self, binding_id: BindingId) {
        self.registry.binding_destroyed(binding_id);
    }

    pub(crate) fn dependent_bindings(&self, binding_id: BindingId) -> Vec<Arc<dyn DependentBinding>> {
        self.registry.dependent_bindings(binding_id)
    }

    pub(crate) fn report_error(&self, message: &str, class_name: &str, error: &BindingError) {
        self.reporter.report(message, class_name, error);
    }
}
