//! Shared type definitions for the bindery workspace.
//!
//! These types carry no behavior beyond parsing and validation. They are consumed by the
//! helper crate (`bindery-util`) and the binding engine (`bindery-engine`).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod config;
pub mod group;
pub mod metadata;

pub use config::{ConfigError, ModelConfig};
pub use group::{AUTO_GROUP_ID, DIRECT_GROUP_ID, GroupId, GroupIdError, validate_group_id};
pub use metadata::{OperationKind, OperationMetadata, OperationParameter, OperationReturnType};

/// Query options sent with a request (`$select`, `$expand`, custom options, ...).
///
/// Values stay JSON so that structured options such as a nested `$expand` map survive
/// until the requestor serializes them.
pub type QueryOptions = IndexMap<String, Value>;

/// Binding parameters as passed by the application (`$$groupId`, query options, ...).
pub type BindingParameters = IndexMap<String, Value>;

/// Marker appended to a binding path to declare a deferred operation.
pub const OPERATION_MARKER: &str = "(...)";

/// Reason attached to a binding `change` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeReason {
    /// The binding was initialized, executed, or its parameters changed.
    Change,
    /// The parent context changed.
    Context,
    /// The binding was refreshed.
    Refresh,
    /// The bound entity was deleted.
    Remove,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::Change => "change",
            ChangeReason::Context => "context",
            ChangeReason::Refresh => "refresh",
            ChangeReason::Remove => "remove",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_reason_serializes_in_camel_case() {
        let json = serde_json::to_string(&ChangeReason::Refresh).expect("serialize");
        assert_eq!(json, "\"refresh\"");
        let parsed: ChangeReason = serde_json::from_str("\"remove\"").expect("deserialize");
        assert_eq!(parsed, ChangeReason::Remove);
    }
}
