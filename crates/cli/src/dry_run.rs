//! Caches that record the requests a binding would send instead of sending them.

use std::sync::{Arc, Mutex, PoisonError};

use bindery_engine::{Cache, CacheFactory, CacheRef, Context, DataRequestedCallback, DeleteCallback, ListenerRef, SyncPromise};
use bindery_types::QueryOptions;
use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::debug;

type RequestLog = Arc<Mutex<Vec<Value>>>;

/// Hands out [`DryRunCache`]s that all write to one request log.
#[derive(Debug, Default, Clone)]
pub struct DryRunCacheFactory {
    requests: RequestLog,
}

impl DryRunCacheFactory {
    /// Requests recorded so far, in the order the binding issued them.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CacheFactory for DryRunCacheFactory {
    fn create_single(&self, resource_path: &str, query_options: &QueryOptions, auto_expand_select: bool, post: bool) -> CacheRef {
        debug!(resource_path, post, "creating dry-run cache");
        Arc::new(DryRunCache {
            resource_path: resource_path.to_string(),
            query_options: query_options.clone(),
            auto_expand_select,
            requests: Arc::clone(&self.requests),
        })
    }
}

/// Answers every read with an empty object and every write with success.
#[derive(Debug)]
pub struct DryRunCache {
    resource_path: String,
    query_options: QueryOptions,
    auto_expand_select: bool,
    requests: RequestLog,
}

impl DryRunCache {
    fn record(&self, method: &str, group_id: &str, mut details: serde_json::Map<String, Value>) {
        details.insert("method".into(), Value::String(method.to_string()));
        details.insert("resourcePath".into(), Value::String(self.resource_path.clone()));
        details.insert("groupId".into(), Value::String(group_id.to_string()));
        if !self.query_options.is_empty() {
            details.insert("queryOptions".into(), json!(self.query_options));
        }
        if self.auto_expand_select {
            details.insert("autoExpandSelect".into(), Value::Bool(true));
        }
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(Value::Object(details));
    }
}

impl Cache for DryRunCache {
    fn resource_path(&self) -> &str {
        &self.resource_path
    }

    fn fetch_value(&self, group_id: &str, path: &str, on_data_requested: DataRequestedCallback, _listener: Option<ListenerRef>) -> SyncPromise<Value> {
        on_data_requested();
        let mut details = serde_json::Map::new();
        if !path.is_empty() {
            details.insert("path".into(), Value::String(path.to_string()));
        }
        self.record("GET", group_id, details);
        SyncPromise::resolve(json!({}))
    }

    fn post(&self, group_id: &str, body: &IndexMap<String, Value>, etag: Option<&str>) -> SyncPromise<Value> {
        let mut details = serde_json::Map::new();
        details.insert("body".into(), json!(body));
        if let Some(etag) = etag {
            details.insert("ifMatch".into(), Value::String(etag.to_string()));
        }
        self.record("POST", group_id, details);
        SyncPromise::resolve(json!({}))
    }

    fn deregister_change(&self, _path: &str, _listener: &ListenerRef) {}

    fn has_pending_changes_for_path(&self, _path: &str) -> bool {
        false
    }

    fn reset_changes_for_path(&self, _path: &str) {}

    fn delete(&self, group_id: &str, edit_url: &str, path: &str, on_success: DeleteCallback) -> SyncPromise<()> {
        let mut details = serde_json::Map::new();
        details.insert("editUrl".into(), Value::String(edit_url.to_string()));
        details.insert("path".into(), Value::String(path.to_string()));
        self.record("DELETE", group_id, details);
        on_success();
        SyncPromise::resolve(())
    }
}

/// A context created by the model itself; it has a path and nothing else.
#[derive(Debug, Clone)]
pub struct BaseContext {
    path: String,
}

impl BaseContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Context for BaseContext {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn has_binding(&self) -> bool {
        false
    }
}
