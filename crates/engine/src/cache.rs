//! The binding's single cache slot.
//!
//! The slot holds a [`SyncPromise`] of the current cache (`None` when the binding reads
//! through its parent context). Every rebuild bumps a generation counter; a rebuild that
//! settles after a newer one started is discarded instead of installed.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bindery_types::QueryOptions;
use bindery_util::merge_query_options;
use tracing::debug;

use crate::{
    error::BindingError,
    model::{CacheRef, ContextRef, ModelHandle},
    promise::SyncPromise,
};

#[derive(Debug)]
pub(crate) struct CacheCoordinator {
    generation: u64,
    current: SyncPromise<Option<CacheRef>>,
    /// Own caches of a relative binding below binding-owned contexts, by canonical path.
    caches_by_context: HashMap<String, CacheRef>,
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self {
            generation: 0,
            current: SyncPromise::resolve(None),
            caches_by_context: HashMap::new(),
        }
    }
}

/// What a cache rebuild depends on.
pub(crate) struct CacheInputs<'a> {
    pub model: &'a ModelHandle,
    pub path: &'a str,
    pub relative: bool,
    pub is_operation: bool,
    pub query_options: &'a QueryOptions,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SharedCacheSlot(Arc<Mutex<CacheCoordinator>>);

impl SharedCacheSlot {
    fn lock(&self) -> MutexGuard<'_, CacheCoordinator> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current(&self) -> SyncPromise<Option<CacheRef>> {
        self.lock().current.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Replaces the slot with a new cache pipeline for `context`.
    ///
    /// Operation bindings and unresolved relative bindings get no cache. Absolute bindings
    /// and relative bindings below a base context get an own cache at their resolved path.
    /// Relative bindings below a binding-owned context get an own cache only if they
    /// declare query options; it lives below the context's canonical path.
    pub(crate) fn fetch_cache(&self, inputs: &CacheInputs<'_>, context: Option<&ContextRef>) -> SyncPromise<Option<CacheRef>> {
        let generation = {
            let mut coordinator = self.lock();
            coordinator.generation += 1;
            coordinator.generation
        };
        let query_options = merge_query_options(&inputs.model.config().uri_parameters, inputs.query_options);
        let context = if inputs.relative { context } else { None };

        let promise = if inputs.is_operation {
            SyncPromise::resolve(None)
        } else if !inputs.relative {
            SyncPromise::resolve(Some(create_cache(inputs.model, &inputs.path[1..], &query_options)))
        } else {
            match context {
                None => SyncPromise::resolve(None),
                Some(context) if !context.has_binding() => match inputs.model.resolve(inputs.path, Some(context)) {
                    Some(resolved) => {
                        let resource_path = resolved.trim_start_matches('/').to_string();
                        SyncPromise::resolve(Some(create_cache(inputs.model, &resource_path, &query_options)))
                    }
                    None => SyncPromise::resolve(None),
                },
                Some(_) if inputs.query_options.is_empty() => SyncPromise::resolve(None),
                Some(context) => {
                    let slot = self.clone();
                    let model = inputs.model.clone();
                    let path = inputs.path.to_string();
                    context.fetch_canonical_path().then(move |canonical_path| {
                        let mut coordinator = slot.lock();
                        if coordinator.generation != generation {
                            debug!(generation, current = coordinator.generation, "discarding stale cache");
                            return SyncPromise::reject(BindingError::CacheDiscarded);
                        }
                        let cache = coordinator
                            .caches_by_context
                            .entry(canonical_path.clone())
                            .or_insert_with(|| {
                                let resource_path = bindery_util::build_path(&[&canonical_path, &path]);
                                create_cache(&model, resource_path.trim_start_matches('/'), &query_options)
                            })
                            .clone();
                        SyncPromise::resolve(Some(cache))
                    })
                }
            }
        };

        let mut coordinator = self.lock();
        if coordinator.generation == generation {
            coordinator.current = promise.clone();
        }
        promise
    }

    /// Installs a cache created for an operation call.
    pub(crate) fn install(&self, cache: CacheRef) {
        let mut coordinator = self.lock();
        coordinator.generation += 1;
        debug!(resource_path = cache.resource_path(), generation = coordinator.generation, "operation cache installed");
        coordinator.current = SyncPromise::resolve(Some(cache));
    }

    pub(crate) fn discard_caches_by_context(&self) {
        self.lock().caches_by_context.clear();
    }

    /// Drops the current cache; the slot reads as "no cache" afterwards.
    pub(crate) fn clear(&self) {
        let mut coordinator = self.lock();
        coordinator.generation += 1;
        coordinator.current = SyncPromise::resolve(None);
        coordinator.caches_by_context.clear();
    }
}

fn create_cache(model: &ModelHandle, resource_path: &str, query_options: &QueryOptions) -> CacheRef {
    debug!(resource_path, option_count = query_options.len(), "creating single cache");
    model
        .cache_factory()
        .create_single(resource_path, query_options, model.config().auto_expand_select, false)
}
