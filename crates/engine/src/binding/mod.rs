//! The context binding controller.
//!
//! A [`ContextBinding`] binds one entity or one deferred operation. It owns a single cache
//! slot, exposes an element context for dependents, and cascades refreshes to the bindings
//! registered below it.

mod parent;

pub use parent::ParentBinding;

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use bindery_types::{BindingParameters, ChangeReason, OPERATION_MARKER, OperationMetadata, QueryOptions};
use bindery_util::{build_binding_parameters, build_path, is_deferred_operation_path, merge_query_options, operation_name, parent_segment_path};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    cache::{CacheInputs, SharedCacheSlot},
    error::{BindingError, SyncResult},
    event::{BindingEvent, DataReceived, EventHandler, EventHandlers, EventKind, HandlerId},
    metadata::resolve_operation_metadata,
    model::{BindingId, CacheRef, ContextRef, DeleteCallback, DependentBinding, ListenerRef, ModelHandle},
    operation::{OperationState, action_resource_path, function_resource_path},
    promise::SyncPromise,
};

const BINDING_PARAMETERS: &[&str] = &["$$groupId", "$$updateGroupId"];

#[derive(Debug, Default)]
struct BindingState {
    context: Option<ContextRef>,
    element_context: Option<ContextRef>,
    parameters: BindingParameters,
    query_options: QueryOptions,
    group_id: Option<String>,
    update_group_id: Option<String>,
    operation: Option<OperationState>,
    suspended: bool,
    initial: bool,
    destroyed: bool,
}

struct BindingInner {
    id: BindingId,
    model: ModelHandle,
    path: String,
    relative: bool,
    state: Mutex<BindingState>,
    cache: SharedCacheSlot,
    events: Mutex<EventHandlers>,
}

/// Binds a single entity or a deferred operation.
///
/// Cloning yields another handle to the same binding.
#[derive(Clone)]
pub struct ContextBinding {
    inner: Arc<BindingInner>,
}

/// Non-owning handle to a [`ContextBinding`], held by its element contexts.
#[derive(Clone)]
pub struct WeakContextBinding(Weak<BindingInner>);

impl WeakContextBinding {
    pub fn upgrade(&self) -> Option<ContextBinding> {
        self.0.upgrade().map(|inner| ContextBinding { inner })
    }
}

impl fmt::Debug for WeakContextBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(binding) => write!(f, "WeakContextBinding({})", binding.inner.id),
            None => f.write_str("WeakContextBinding(dropped)"),
        }
    }
}

impl ContextBinding {
    pub const CLASS_NAME: &'static str = "bindery::ContextBinding";

    /// Creates a binding for `path`, relative to `context` unless the path starts with `/`.
    ///
    /// A path ending in `(...)` declares a deferred operation; nothing may follow the marker.
    pub fn new(model: ModelHandle, path: &str, context: Option<ContextRef>, parameters: BindingParameters) -> SyncResult<Self> {
        if path.ends_with('/') {
            return Err(BindingError::InvalidPath { path: path.to_string() });
        }
        let operation = match path.find(OPERATION_MARKER) {
            Some(position) if position != path.len() - OPERATION_MARKER.len() => {
                return Err(BindingError::PathContinuesAfterOperation { path: path.to_string() });
            }
            Some(_) => Some(OperationState::default()),
            None => None,
        };
        let relative = !path.starts_with('/');
        let binding = Self {
            inner: Arc::new(BindingInner {
                id: BindingId::next(),
                model,
                path: path.to_string(),
                relative,
                state: Mutex::new(BindingState {
                    operation,
                    initial: true,
                    ..BindingState::default()
                }),
                cache: SharedCacheSlot::default(),
                events: Mutex::new(EventHandlers::default()),
            }),
        };
        binding.apply_parameters(parameters, None)?;
        if !relative {
            let element_context = binding.inner.model.create_context(&binding, path);
            binding.state().element_context = Some(element_context);
        }
        binding.set_context(context);
        binding.inner.model.binding_created(&binding);
        debug!(binding = %binding, id = %binding.inner.id, "context binding created");
        Ok(binding)
    }

    fn state(&self) -> MutexGuard<'_, BindingState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn downgrade(&self) -> WeakContextBinding {
        WeakContextBinding(Arc::downgrade(&self.inner))
    }

    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    pub fn model(&self) -> &ModelHandle {
        &self.inner.model
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn is_relative(&self) -> bool {
        self.inner.relative
    }

    pub fn is_deferred(&self) -> bool {
        self.state().operation.is_some()
    }

    /// The parent context, if any.
    pub fn context(&self) -> Option<ContextRef> {
        self.state().context.clone()
    }

    /// The element context dependents bind against.
    pub fn bound_context(&self) -> Option<ContextRef> {
        self.state().element_context.clone()
    }

    pub fn is_resolved(&self) -> bool {
        !self.inner.relative || self.state().context.is_some()
    }

    pub fn resolved_path(&self) -> Option<String> {
        let context = self.context();
        self.inner.model.resolve(&self.inner.path, context.as_ref())
    }

    /// The group for reads and operation calls: the binding's `$$groupId` or the model default.
    pub fn group_id(&self) -> String {
        self.state()
            .group_id
            .clone()
            .unwrap_or_else(|| self.inner.model.group_id().to_string())
    }

    pub fn update_group_id(&self) -> String {
        self.state()
            .update_group_id
            .clone()
            .unwrap_or_else(|| self.inner.model.update_group_id().to_string())
    }

    pub fn query_options(&self) -> QueryOptions {
        self.state().query_options.clone()
    }

    pub fn parameters(&self) -> BindingParameters {
        self.state().parameters.clone()
    }

    /// Parameters set for the next operation call; `None` unless deferred.
    pub fn operation_parameters(&self) -> Option<IndexMap<String, Value>> {
        self.state().operation.as_ref().map(|operation| operation.parameters.clone())
    }

    /// The resource path of the last operation call.
    pub fn operation_resource_path(&self) -> Option<String> {
        self.state().operation.as_ref().and_then(|operation| operation.resource_path.clone())
    }

    /// `Some(true)` after an action call, `Some(false)` after a function call.
    pub fn operation_kind_is_action(&self) -> Option<bool> {
        self.state().operation.as_ref().and_then(|operation| operation.is_action)
    }

    /// Number of cache rebuilds so far.
    pub fn cache_generation(&self) -> u64 {
        self.inner.cache.generation()
    }

    /// The current cache, once the cache pipeline has settled.
    pub fn current_cache(&self) -> Option<CacheRef> {
        self.inner.cache.current().result().flatten()
    }

    /// Whether no change notification has been fired yet.
    pub fn is_initial(&self) -> bool {
        self.state().initial
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Validates and applies binding parameters.
    ///
    /// Entity bindings rebuild their cache and then refresh (with a reason) or check for
    /// updates (without). A function binding that was already called is called again.
    pub fn apply_parameters(&self, parameters: BindingParameters, reason: Option<ChangeReason>) -> SyncResult<()> {
        let query_options = self.inner.model.build_query_options(&parameters)?;
        let mut binding_parameters = build_binding_parameters(&parameters, BINDING_PARAMETERS)?;
        let (context, is_operation, is_function) = {
            let mut state = self.state();
            state.query_options = query_options;
            state.group_id = binding_parameters.shift_remove("$$groupId");
            state.update_group_id = binding_parameters.shift_remove("$$updateGroupId");
            state.parameters = parameters;
            let is_function = state.operation.as_ref().is_some_and(OperationState::is_function);
            (state.context.clone(), state.operation.is_some(), is_function)
        };

        if !is_operation {
            self.fetch_cache(context.as_ref());
            if reason.is_some() {
                self.refresh_internal(None, true).detach();
            } else {
                self.check_update();
            }
        } else if is_function {
            debug!(path = %self.inner.path, "re-executing function after parameter change");
            self.execute(None)?.detach();
        }
        Ok(())
    }

    /// Sets the base context and announces the binding.
    pub fn initialize(&self, context: Option<ContextRef>) {
        let context_changed = self.switch_context(context);
        if !context_changed && self.is_resolved() {
            self.fire_change(ChangeReason::Change);
        }
    }

    /// Sets the parent context. Unchanged contexts are ignored.
    pub fn set_context(&self, context: Option<ContextRef>) {
        self.switch_context(context);
    }

    /// Returns whether a context change notification was fired.
    fn switch_context(&self, context: Option<ContextRef>) -> bool {
        let (unchanged, had_context) = {
            let state = self.state();
            let unchanged = match (&state.context, &context) {
                (Some(current), Some(next)) => Arc::ptr_eq(current, next),
                (None, None) => true,
                _ => false,
            };
            (unchanged, state.context.is_some())
        };
        if unchanged {
            return false;
        }
        if !(self.inner.relative && (had_context || context.is_some())) {
            self.state().context = context;
            return false;
        }

        let stale = self.state().element_context.take();
        if let Some(stale) = stale {
            stale.destroy();
        }
        self.fetch_cache(context.as_ref());
        let element_context = context
            .as_ref()
            .and_then(|context| self.inner.model.resolve(&self.inner.path, Some(context)))
            .map(|resolved| self.inner.model.create_context(self, &resolved));
        {
            let mut state = self.state();
            state.element_context = element_context;
            state.context = context;
        }
        self.fire_change(ChangeReason::Context);
        true
    }

    fn fetch_cache(&self, context: Option<&ContextRef>) {
        let (query_options, is_operation) = {
            let state = self.state();
            (state.query_options.clone(), state.operation.is_some())
        };
        let inputs = CacheInputs {
            model: &self.inner.model,
            path: &self.inner.path,
            relative: self.inner.relative,
            is_operation,
            query_options: &query_options,
        };
        self.inner.cache.fetch_cache(&inputs, context);
    }

    /// Calls the deferred operation.
    ///
    /// Usage errors are returned right away. Metadata, parameter and backend errors reject
    /// the returned promise and are reported once. The call runs to completion whether or
    /// not the promise is awaited.
    pub fn execute(&self, group_id: Option<&str>) -> SyncResult<SyncPromise<()>> {
        self.inner.model.check_group_id(group_id)?;
        let (is_operation, context) = {
            let state = self.state();
            (state.operation.is_some(), state.context.clone())
        };
        if !is_operation {
            return Err(BindingError::NotDeferred {
                path: self.inner.path.clone(),
            });
        }
        if self.inner.relative {
            let context = context.ok_or_else(|| BindingError::Unresolved {
                path: self.inner.path.clone(),
            })?;
            let resolved = || self.inner.model.resolve(&self.inner.path, Some(&context)).unwrap_or_default();
            if context.is_transient() {
                return Err(BindingError::TransientContext { path: resolved() });
            }
            if is_deferred_operation_path(&context.path()) {
                return Err(BindingError::NestedOperation { path: resolved() });
            }
        }

        debug!(path = %self.inner.path, group_id = ?group_id, "executing operation");
        let group_id = group_id.map(str::to_string);
        let requesting = self.clone();
        let notifying = self.clone();
        let reporting = self.clone();
        let promise = self
            .fetch_operation_metadata()
            .then({
                let group_id = group_id.clone();
                move |metadata| requesting.request_operation(metadata, group_id)
            })
            .then(move |_| {
                notifying.fire_change(ChangeReason::Change);
                notifying.refresh_dependents(group_id.as_deref(), true)
            })
            .inspect_err(move |error| {
                reporting.inner.model.report_error(
                    &format!("Failed to execute {}", reporting.inner.path),
                    Self::CLASS_NAME,
                    error,
                );
            });
        Ok(promise.driven())
    }

    fn fetch_operation_metadata(&self) -> SyncPromise<OperationMetadata> {
        match self.state().operation.as_ref() {
            Some(OperationState { metadata: Some(metadata), .. }) => return metadata.clone(),
            Some(_) => {}
            None => {
                return SyncPromise::reject(BindingError::NotDeferred {
                    path: self.inner.path.clone(),
                });
            }
        }
        let name = operation_name(&self.inner.path);
        debug!(operation = name, "resolving operation metadata");
        let metadata = resolve_operation_metadata(Arc::clone(self.inner.model.meta_model()), name);
        if let Some(operation) = self.state().operation.as_mut() {
            operation.metadata = Some(metadata.clone());
        }
        metadata
    }

    fn request_operation(&self, metadata: OperationMetadata, group_id: Option<String>) -> SyncPromise<Value> {
        if !self.inner.relative {
            return self.create_cache_and_request(&self.inner.path, &metadata, group_id.as_deref());
        }
        let Some(context) = self.context() else {
            return SyncPromise::reject(BindingError::Unresolved {
                path: self.inner.path.clone(),
            });
        };
        if !context.has_binding() {
            let base = context.path();
            let operation_path = if base == "/" {
                format!("/{}", self.inner.path)
            } else {
                format!("{}/{}", base, self.inner.path)
            };
            return self.create_cache_and_request(&operation_path, &metadata, group_id.as_deref());
        }
        let binding = self.clone();
        context.fetch_canonical_path().then(move |canonical_path| {
            let operation_path = format!("{}/{}", canonical_path, binding.inner.path);
            binding.create_cache_and_request(&operation_path, &metadata, group_id.as_deref())
        })
    }

    /// Creates a fresh cache for the operation at `operation_path` and sends the request.
    ///
    /// Actions post the operation parameters, with the parent entity's ETag if it is
    /// available. Functions carry their parameters in the resource path.
    fn create_cache_and_request(&self, operation_path: &str, metadata: &OperationMetadata, group_id: Option<&str>) -> SyncPromise<Value> {
        let group_id = group_id.map(str::to_string).unwrap_or_else(|| self.group_id());
        let is_action = metadata.is_action();
        let (parameters, query_options, context) = {
            let mut state = self.state();
            let query_options = merge_query_options(&self.inner.model.config().uri_parameters, &state.query_options);
            let context = state.context.clone();
            let Some(operation) = state.operation.as_mut() else {
                return SyncPromise::reject(BindingError::NotDeferred {
                    path: self.inner.path.clone(),
                });
            };
            operation.is_action = Some(is_action);
            (operation.parameters.clone(), query_options, context)
        };
        let factory = self.inner.model.cache_factory();
        let auto_expand_select = self.inner.model.config().auto_expand_select;

        if is_action {
            let resource_path = action_resource_path(operation_path);
            let cache = factory.create_single(resource_path, &query_options, auto_expand_select, true);
            let etag = context
                .filter(|context| self.inner.relative && context.has_binding())
                .and_then(|context| context.object(parent_segment_path(&self.inner.path)))
                .and_then(|entity| entity.get("@odata.etag").and_then(Value::as_str).map(str::to_string));
            debug!(resource_path, etag = ?etag, "posting action");
            self.remember_resource_path(resource_path);
            self.inner.cache.install(Arc::clone(&cache));
            cache.post(&group_id, &parameters, etag.as_deref())
        } else {
            let resource_path = match function_resource_path(operation_path, metadata, &parameters) {
                Ok(resource_path) => resource_path,
                Err(error) => return SyncPromise::reject(error),
            };
            let cache = factory.create_single(&resource_path, &query_options, auto_expand_select, false);
            debug!(resource_path = %resource_path, "calling function");
            self.remember_resource_path(&resource_path);
            self.inner.cache.install(Arc::clone(&cache));
            cache.fetch_value(&group_id, "", Box::new(|| {}), None)
        }
    }

    fn remember_resource_path(&self, resource_path: &str) {
        if let Some(operation) = self.state().operation.as_mut() {
            operation.resource_path = Some(resource_path.to_string());
        }
    }

    /// Sets a parameter for the next call of the deferred operation.
    pub fn set_parameter(&self, name: &str, value: Option<Value>) -> SyncResult<&Self> {
        let mut state = self.state();
        let Some(operation) = state.operation.as_mut() else {
            return Err(BindingError::NotDeferred {
                path: self.inner.path.clone(),
            });
        };
        if name.is_empty() {
            return Err(BindingError::MissingParameterName);
        }
        let value = value.ok_or_else(|| BindingError::MissingParameterValue { name: name.to_string() })?;
        operation.set_parameter(name, value);
        Ok(self)
    }

    /// Reads the value at `path`.
    ///
    /// Paths below this binding are read from the own cache. Without own cache an entity
    /// binding reads through its parent context.
    pub fn fetch_value(&self, path: &str, listener: Option<ListenerRef>, group_id: Option<&str>) -> SyncPromise<Option<Value>> {
        let binding = self.clone();
        let path = path.to_string();
        let group_id = group_id.map(str::to_string);
        self.inner
            .cache
            .current()
            .then(move |cache| binding.fetch_value_from(cache, &path, listener, group_id.as_deref()))
    }

    fn fetch_value_from(
        &self,
        cache: Option<CacheRef>,
        path: &str,
        listener: Option<ListenerRef>,
        group_id: Option<&str>,
    ) -> SyncPromise<Option<Value>> {
        if let Some(cache) = cache
            && let Some(relative_path) = self.relative_path(path)
        {
            let group_id = group_id.map(str::to_string).unwrap_or_else(|| self.group_id());
            let data_requested = Arc::new(AtomicBool::new(false));
            let on_data_requested = {
                let binding = self.clone();
                let data_requested = Arc::clone(&data_requested);
                Box::new(move || {
                    data_requested.store(true, Ordering::SeqCst);
                    binding.fire_event(&BindingEvent::DataRequested);
                })
            };
            let on_success = (self.clone(), Arc::clone(&data_requested));
            let on_failure = (self.clone(), data_requested);
            return cache
                .fetch_value(&group_id, &relative_path, on_data_requested, listener)
                .map(move |value| {
                    let (binding, data_requested) = on_success;
                    if data_requested.load(Ordering::SeqCst) {
                        binding.fire_event(&BindingEvent::DataReceived(DataReceived::empty()));
                    }
                    Some(value)
                })
                .inspect_err(move |error| {
                    let (binding, data_requested) = on_failure;
                    if data_requested.load(Ordering::SeqCst) {
                        binding.inner.model.report_error(
                            &format!("Failed to read path {}", binding.inner.path),
                            Self::CLASS_NAME,
                            error,
                        );
                        let received = if error.is_canceled() {
                            DataReceived::empty()
                        } else {
                            DataReceived::Error(error.clone())
                        };
                        binding.fire_event(&BindingEvent::DataReceived(received));
                    }
                });
        }
        let (is_operation, context) = {
            let state = self.state();
            (state.operation.is_some(), state.context.clone())
        };
        match context {
            Some(context) if !is_operation => context.fetch_value(path, listener, group_id),
            _ => SyncPromise::resolve(None),
        }
    }

    /// The part of `path` below this binding's resolved path. Relative paths are returned
    /// unchanged; absolute paths outside this binding yield `None`.
    pub fn relative_path(&self, path: &str) -> Option<String> {
        if !path.starts_with('/') {
            return Some(path.to_string());
        }
        let resolved = self.resolved_path()?;
        bindery_util::relative_path(path, &resolved)
    }

    /// Refreshes the binding without checking for pending changes.
    ///
    /// An entity binding with own cache rebuilds it and cascades to its dependents; no
    /// change notification is fired for that. A function binding calls the function again.
    /// Action bindings and operations never called ignore the refresh.
    pub fn refresh_internal(&self, group_id: Option<&str>, check_update: bool) -> SyncPromise<()> {
        let binding = self.clone();
        let group_id = group_id.map(str::to_string);
        self.inner
            .cache
            .current()
            .then(move |cache| binding.refresh_with(cache, group_id.as_deref(), check_update))
    }

    fn refresh_with(&self, cache: Option<CacheRef>, group_id: Option<&str>, check_update: bool) -> SyncPromise<()> {
        let (context, needs_element_context, is_operation, is_function) = {
            let state = self.state();
            if state.destroyed {
                return SyncPromise::resolve(());
            }
            (
                state.context.clone(),
                state.element_context.is_none(),
                state.operation.is_some(),
                state.operation.as_ref().is_some_and(OperationState::is_function),
            )
        };

        if needs_element_context && let Some(resolved) = self.inner.model.resolve(&self.inner.path, context.as_ref()) {
            debug!(path = %resolved, "recreating element context after delete");
            let element_context = self.inner.model.create_context(self, &resolved);
            self.state().element_context = Some(element_context);
            if cache.is_none() {
                self.fire_change(ChangeReason::Refresh);
            }
        }

        if !is_operation {
            if cache.is_some() {
                self.inner.cache.discard_caches_by_context();
                self.fetch_cache(context.as_ref());
            }
            self.refresh_dependents(group_id, check_update)
        } else if is_function {
            match self.execute(group_id) {
                // failures are reported by execute
                Ok(promise) => promise.catch(|_| SyncPromise::resolve(())),
                Err(error) => {
                    warn!(path = %self.inner.path, error = %error, "function re-execution failed");
                    SyncPromise::resolve(())
                }
            }
        } else {
            SyncPromise::resolve(())
        }
    }

    fn refresh_dependents(&self, group_id: Option<&str>, check_update: bool) -> SyncPromise<()> {
        let dependents = self.inner.model.dependent_bindings(self.inner.id);
        debug!(path = %self.inner.path, count = dependents.len(), "refreshing dependent bindings");
        let refreshes = dependents
            .iter()
            .map(|dependent| dependent.refresh_internal(group_id, check_update))
            .collect();
        SyncPromise::all(refreshes).map(|_| ())
    }

    /// Lets dependents check whether their values changed.
    pub fn check_update(&self) {
        for dependent in self.inner.model.dependent_bindings(self.inner.id) {
            dependent.check_update();
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        ParentBinding::has_pending_changes(self)
    }

    pub fn reset_changes(&self) {
        ParentBinding::reset_changes(self);
    }

    /// Deletes the bound entity. On success the element context is destroyed and a
    /// `Remove` change is fired.
    ///
    /// A binding with empty path lets its parent context delete instead.
    pub fn delete(&self, group_id: Option<&str>, edit_url: &str) -> SyncResult<SyncPromise<()>> {
        if self.inner.path.is_empty()
            && let Some(context) = self.context().filter(|context| context.supports_delete())
        {
            return context.delete(group_id);
        }
        if self.has_pending_changes() {
            return Err(BindingError::PendingChanges {
                action: "delete".to_string(),
            });
        }
        let binding = self.clone();
        self.delete_from_cache(
            group_id,
            edit_url,
            "",
            Box::new(move || {
                let element_context = binding.state().element_context.take();
                if let Some(element_context) = element_context {
                    element_context.destroy();
                }
                binding.fire_change(ChangeReason::Remove);
            }),
        )
    }

    /// Deletes the entity at `path` below this binding through the own cache, or through
    /// the parent context if there is none.
    pub fn delete_from_cache(
        &self,
        group_id: Option<&str>,
        edit_url: &str,
        path: &str,
        on_success: DeleteCallback,
    ) -> SyncResult<SyncPromise<()>> {
        match self.inner.cache.current().result() {
            Some(Some(cache)) => {
                let group_id = group_id.map(str::to_string).unwrap_or_else(|| self.update_group_id());
                self.inner.model.check_group_id(Some(&group_id))?;
                Ok(cache.delete(&group_id, edit_url, path, on_success))
            }
            Some(None) => match self.context() {
                Some(context) => context.delete_from_cache(group_id, edit_url, &build_path(&[&self.inner.path, path]), on_success),
                None => Err(BindingError::DeleteNotAllowed {
                    path: self.inner.path.clone(),
                }),
            },
            None => Err(BindingError::DeleteNotAllowed {
                path: self.inner.path.clone(),
            }),
        }
    }

    /// Removes a change listener. Ignored while the cache pipeline is unsettled.
    pub fn deregister_change(&self, path: &str, listener: &ListenerRef) {
        let current = self.inner.cache.current();
        match current.result() {
            Some(Some(cache)) => cache.deregister_change(path, listener),
            Some(None) => {
                if let Some(context) = self.context() {
                    context.deregister_change(&build_path(&[&self.inner.path, path]), listener);
                }
            }
            None => {}
        }
    }

    /// Destroys the binding. It must not be used afterwards.
    pub fn destroy(&self) {
        let element_context = {
            let mut state = self.state();
            state.destroyed = true;
            state.context = None;
            state.element_context.take()
        };
        if let Some(element_context) = element_context {
            element_context.destroy();
        }
        self.inner.model.binding_destroyed(self.inner.id);
        self.inner.cache.clear();
        self.events().clear();
        debug!(path = %self.inner.path, id = %self.inner.id, "context binding destroyed");
    }

    fn events(&self) -> MutexGuard<'_, EventHandlers> {
        self.inner.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a handler for `change`, `dataRequested` or `dataReceived`.
    pub fn attach_event(&self, event: &str, handler: EventHandler) -> SyncResult<HandlerId> {
        let kind = event.parse::<EventKind>()?;
        Ok(self.events().attach(kind, handler))
    }

    pub fn detach_event(&self, kind: EventKind, id: HandlerId) -> bool {
        self.events().detach(kind, id)
    }

    fn fire_change(&self, reason: ChangeReason) {
        self.state().initial = false;
        self.fire_event(&BindingEvent::Change { reason });
    }

    fn fire_event(&self, event: &BindingEvent) {
        let handlers = self.events().snapshot(event.kind());
        for handler in handlers {
            handler(event);
        }
    }
}

impl ParentBinding for ContextBinding {
    fn binding_path(&self) -> String {
        self.inner.path.clone()
    }

    fn parameters(&self) -> BindingParameters {
        ContextBinding::parameters(self)
    }

    fn apply_parameters(&self, parameters: BindingParameters, reason: Option<ChangeReason>) -> SyncResult<()> {
        ContextBinding::apply_parameters(self, parameters, reason)
    }

    fn own_pending_changes(&self) -> bool {
        self.current_cache().is_some_and(|cache| cache.has_pending_changes_for_path(""))
    }

    fn reset_own_changes(&self) {
        if let Some(cache) = self.current_cache() {
            cache.reset_changes_for_path("");
        }
    }

    fn dependent_bindings(&self) -> Vec<Arc<dyn DependentBinding>> {
        self.inner.model.dependent_bindings(self.inner.id)
    }

    fn is_refreshable(&self) -> bool {
        !self.inner.relative || self.context().is_some_and(|context| !context.has_binding())
    }

    fn is_relative(&self) -> bool {
        self.inner.relative
    }

    fn is_suspended(&self) -> bool {
        self.state().suspended
    }

    fn set_suspended(&self, suspended: bool) {
        self.state().suspended = suspended;
    }

    fn resume_internal(&self) {
        let context = self.context();
        self.fetch_cache(context.as_ref());
        self.refresh_dependents(None, false).detach();
        self.fire_change(ChangeReason::Change);
    }

    fn refresh_internal(&self, group_id: Option<&str>, check_update: bool) {
        ContextBinding::refresh_internal(self, group_id, check_update).detach();
    }

    fn check_group_id(&self, group_id: Option<&str>) -> SyncResult<()> {
        self.inner.model.check_group_id(group_id)
    }

    fn is_initial(&self) -> bool {
        ContextBinding::is_initial(self)
    }
}

impl DependentBinding for ContextBinding {
    fn refresh_internal(&self, group_id: Option<&str>, check_update: bool) -> SyncPromise<()> {
        ContextBinding::refresh_internal(self, group_id, check_update)
    }

    fn check_update(&self) {
        ContextBinding::check_update(self);
    }

    fn has_pending_changes(&self) -> bool {
        ParentBinding::has_pending_changes(self)
    }

    fn reset_changes(&self) {
        ParentBinding::reset_changes(self);
    }
}

impl fmt::Display for ContextBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.relative {
            let context_path = self.context().map(|context| context.path()).unwrap_or_default();
            write!(f, "{}: {}|{}", Self::CLASS_NAME, context_path, self.inner.path)
        } else {
            write!(f, "{}: {}", Self::CLASS_NAME, self.inner.path)
        }
    }
}

impl fmt::Debug for ContextBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBinding")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("relative", &self.inner.relative)
            .finish()
    }
}
