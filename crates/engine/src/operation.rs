//! State of a deferred operation binding.

use bindery_types::{OPERATION_MARKER, OperationMetadata};
use bindery_util::{encode_uri_component, format_literal};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    error::{BindingError, SyncResult},
    promise::SyncPromise,
};

/// Deferred operation flags and parameters.
///
/// `is_action` is `None` until an execution resolved the operation kind, and again after
/// every parameter change.
#[derive(Debug, Clone, Default)]
pub struct OperationState {
    pub is_action: Option<bool>,
    pub parameters: IndexMap<String, Value>,
    pub resource_path: Option<String>,
    pub(crate) metadata: Option<SyncPromise<OperationMetadata>>,
}

impl OperationState {
    pub fn set_parameter(&mut self, name: &str, value: Value) {
        self.parameters.insert(name.to_string(), value);
        self.is_action = None;
    }

    /// Whether the last execution was a function call. Only functions re-execute on refresh.
    pub fn is_function(&self) -> bool {
        self.is_action == Some(false)
    }
}

/// Builds the resource path of a function call from an absolute operation path.
///
/// The marker is replaced by the parameter list in declaration order. Parameters without
/// a value are skipped.
///
/// ```ignore
/// // "/Products('1')/name.space.Rate(...)" with Score = 5
/// assert_eq!(path, "Products('1')/name.space.Rate(Score=5)");
/// ```
pub fn function_resource_path(
    operation_path: &str,
    metadata: &OperationMetadata,
    parameters: &IndexMap<String, Value>,
) -> SyncResult<String> {
    let mut pairs = Vec::new();
    for parameter in &metadata.parameters {
        let Some(value) = parameters.get(&parameter.name) else {
            continue;
        };
        if parameter.is_collection {
            return Err(BindingError::CollectionParameter {
                name: parameter.name.clone(),
            });
        }
        let literal = format_literal(value, &parameter.type_name)?;
        pairs.push(format!("{}={}", encode_uri_component(&parameter.name), encode_uri_component(&literal)));
    }
    let bare = action_resource_path(operation_path);
    Ok(format!("{}({})", bare, pairs.join(",")))
}

/// The resource path an action is posted to: the operation path without leading `/` and
/// without marker.
pub fn action_resource_path(operation_path: &str) -> &str {
    let path = operation_path.strip_prefix('/').unwrap_or(operation_path);
    path.strip_suffix(OPERATION_MARKER).unwrap_or(path)
}
