//! Error types for binding operations.
//!
//! Errors are `Clone` because a failed result is shared by every continuation chained to
//! the same [`SyncPromise`](crate::SyncPromise).

use bindery_types::GroupIdError;
use bindery_util::{LiteralError, QueryOptionError};
use thiserror::Error;

/// Result alias used throughout the engine.
pub type SyncResult<T> = Result<T, BindingError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    // usage errors
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("The path must not continue after a deferred operation: {path}")]
    PathContinuesAfterOperation { path: String },

    #[error("Unsupported event '{event}': ContextBinding#attachEvent")]
    UnsupportedEvent { event: String },

    #[error("The binding must be deferred: {path}")]
    NotDeferred { path: String },

    #[error("Missing parameter name")]
    MissingParameterName,

    #[error("Missing value for parameter: {name}")]
    MissingParameterValue { name: String },

    #[error("Cannot {action} due to pending changes")]
    PendingChanges { action: String },

    #[error("Unresolved binding: {path}")]
    Unresolved { path: String },

    #[error("Execute for transient context not allowed: {path}")]
    TransientContext { path: String },

    #[error("Nested deferred operation bindings not supported: {path}")]
    NestedOperation { path: String },

    #[error(transparent)]
    InvalidGroupId(#[from] GroupIdError),

    #[error(transparent)]
    InvalidParameters(#[from] QueryOptionError),

    #[error("Refresh on this binding is not supported: {path}")]
    RefreshNotSupported { path: String },

    #[error("Cannot suspend a relative binding: {path}")]
    SuspendRelative { path: String },

    #[error("Cannot suspend a suspended binding: {path}")]
    AlreadySuspended { path: String },

    #[error("Cannot resume a not suspended binding: {path}")]
    NotSuspended { path: String },

    #[error("DELETE request not allowed: {path}")]
    DeleteNotAllowed { path: String },

    // metadata errors
    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Not an operation: {name}")]
    NotAnOperation { name: String },

    #[error("Unsupported operation overloading: {name}")]
    OperationOverloading { name: String },

    #[error("Invalid metadata for {name}: {reason}")]
    InvalidMetadata { name: String, reason: String },

    // parameter-shape errors
    #[error("Unsupported: collection parameter {name}")]
    CollectionParameter { name: String },

    #[error(transparent)]
    Literal(#[from] LiteralError),

    // remote errors
    #[error("{message}")]
    Backend {
        message: String,
        status: Option<u16>,
        canceled: bool,
    },

    #[error("Cache discarded as a new cache has been created")]
    CacheDiscarded,
}

impl BindingError {
    /// A failure reported by the cache or transport layer.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            status: None,
            canceled: false,
        }
    }

    /// A backend failure carrying an HTTP status.
    pub fn backend_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Backend {
            message: message.into(),
            status: Some(status),
            canceled: false,
        }
    }

    /// A request the transport gave up on, e.g. because a newer request superseded it.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            status: None,
            canceled: true,
        }
    }

    /// Canceled failures complete notifications like a success.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Backend { canceled: true, .. } | Self::CacheDiscarded)
    }

    /// Whether the failure is a usage error raised before any request.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::PathContinuesAfterOperation { .. }
                | Self::UnsupportedEvent { .. }
                | Self::NotDeferred { .. }
                | Self::MissingParameterName
                | Self::MissingParameterValue { .. }
                | Self::PendingChanges { .. }
                | Self::Unresolved { .. }
                | Self::TransientContext { .. }
                | Self::NestedOperation { .. }
                | Self::InvalidGroupId(_)
                | Self::InvalidParameters(_)
                | Self::RefreshNotSupported { .. }
                | Self::SuspendRelative { .. }
                | Self::AlreadySuspended { .. }
                | Self::NotSuspended { .. }
                | Self::DeleteNotAllowed { .. }
        )
    }
}
