//! # Bindery Engine
//!
//! Binding controller for single entities and deferred operations on top of an OData-style
//! data-access layer. The engine decides which cache a binding reads from, when caches are
//! replaced, how operation calls are addressed, and which notifications are fired. It does
//! no I/O itself: caches, metadata, and error reporting are collaborators behind the traits
//! in [`model`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bindery_engine::{ContextBinding, JsonMetaModel, ModelHandle};
//! use bindery_types::ModelConfig;
//!
//! let model = ModelHandle::new(ModelConfig::default(), Arc::new(meta_model), Arc::new(cache_factory))?;
//! let binding = ContextBinding::new(model, "/Orders('1')/name.space.Confirm(...)", None, Default::default())?;
//! binding.execute(None)?.await?;
//! ```
//!
//! ## Architecture
//!
//! - **`binding`**: the [`ContextBinding`] controller and the [`ParentBinding`] capabilities
//! - **`cache`**: the single cache slot with generation-checked replacement
//! - **`operation`** / **`metadata`**: deferred operation state and metadata resolution
//! - **`promise`**: [`SyncPromise`], results that settle synchronously when possible
//! - **`event`**: `change`, `dataRequested`, and `dataReceived` notifications

pub mod binding;
mod cache;
pub mod context;
pub mod error;
pub mod event;
pub mod metadata;
pub mod model;
pub mod operation;
pub mod promise;

pub use binding::{ContextBinding, ParentBinding, WeakContextBinding};
pub use context::{BoundContext, BoundContextFactory};
pub use error::{BindingError, SyncResult};
pub use event::{BindingEvent, DataReceived, EventHandler, EventKind, HandlerId};
pub use metadata::{JsonMetaModel, resolve_operation_metadata};
pub use model::{
    BindingId, BindingRegistry, Cache, CacheFactory, CacheRef, ChangeListener, Context, ContextFactory, ContextRef, DataRequestedCallback,
    DeleteCallback, DependentBinding, ErrorReporter, ListenerRef, MetaModel, ModelHandle, NoDependents, TracingErrorReporter,
};
pub use operation::OperationState;
pub use promise::SyncPromise;
