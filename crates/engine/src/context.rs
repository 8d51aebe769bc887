//! Element contexts created by context bindings.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::{
    binding::{ContextBinding, WeakContextBinding},
    error::{BindingError, SyncResult},
    model::{ContextFactory, ContextRef, DeleteCallback, ListenerRef},
    promise::SyncPromise,
};

/// The bound context a [`ContextBinding`] exposes for its resolved entity or operation result.
///
/// Holds the binding weakly; a context outliving its binding answers reads with `None`.
#[derive(Debug)]
pub struct BoundContext {
    binding: WeakContextBinding,
    path: String,
    destroyed: AtomicBool,
}

impl BoundContext {
    pub fn new(binding: &ContextBinding, path: impl Into<String>) -> Self {
        Self {
            binding: binding.downgrade(),
            path: path.into(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            bindery_util::build_path(&[&self.path, path])
        }
    }
}

impl crate::model::Context for BoundContext {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn fetch_value(&self, path: &str, listener: Option<ListenerRef>, group_id: Option<&str>) -> SyncPromise<Option<Value>> {
        match self.binding.upgrade() {
            Some(binding) => binding.fetch_value(&self.absolute(path), listener, group_id),
            None => SyncPromise::resolve(None),
        }
    }

    fn deregister_change(&self, path: &str, listener: &ListenerRef) {
        if let Some(binding) = self.binding.upgrade() {
            let relative = bindery_util::relative_path(&self.absolute(path), &self.path).unwrap_or_default();
            binding.deregister_change(&relative, listener);
        }
    }

    fn supports_delete(&self) -> bool {
        true
    }

    fn delete(&self, group_id: Option<&str>) -> SyncResult<SyncPromise<()>> {
        let binding = self
            .binding
            .upgrade()
            .ok_or_else(|| BindingError::DeleteNotAllowed { path: self.path.clone() })?;
        let edit_url = self.path.trim_start_matches('/').to_string();
        binding.delete(group_id, &edit_url)
    }

    fn delete_from_cache(
        &self,
        group_id: Option<&str>,
        edit_url: &str,
        path: &str,
        on_success: DeleteCallback,
    ) -> SyncResult<SyncPromise<()>> {
        let binding = self
            .binding
            .upgrade()
            .ok_or_else(|| BindingError::DeleteNotAllowed { path: self.path.clone() })?;
        binding.delete_from_cache(group_id, edit_url, path, on_success)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Creates [`BoundContext`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundContextFactory;

impl ContextFactory for BoundContextFactory {
    fn create(&self, binding: &ContextBinding, path: &str) -> ContextRef {
        std::sync::Arc::new(BoundContext::new(binding, path))
    }
}
