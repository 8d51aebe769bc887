//! Splitting binding parameters into query options and binding-only parameters.
//!
//! Binding parameters use three namespaces: `$$`-prefixed keys configure the binding
//! itself, `$`-prefixed keys are system query options, and everything else is a custom
//! query option forwarded to the service.

use bindery_types::{BindingParameters, GroupId, QueryOptions};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const SYSTEM_QUERY_OPTIONS: &[&str] = &[
    "$apply", "$count", "$expand", "$filter", "$levels", "$orderby", "$search", "$select",
];

const GROUP_PARAMETERS: &[&str] = &["$$groupId", "$$updateGroupId"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryOptionError {
    #[error("System query option {name} is not supported")]
    UnsupportedSystemOption { name: String },

    #[error("Parameter {name} is not supported")]
    UnsupportedParameter { name: String },

    #[error("Custom query option {name} is not supported")]
    UnsupportedCustomOption { name: String },

    #[error("Unsupported binding parameter: {name}")]
    UnsupportedBindingParameter { name: String },

    #[error("Unsupported value for binding parameter '{name}': {value}")]
    UnsupportedBindingParameterValue { name: String, value: String },
}

/// Extracts the query options from `parameters`.
///
/// `$$`-prefixed binding parameters are skipped. When `system_options_allowed` is false
/// every `$`-prefixed key is rejected.
pub fn build_query_options(parameters: &BindingParameters, system_options_allowed: bool) -> Result<QueryOptions, QueryOptionError> {
    let mut options = QueryOptions::new();
    for (name, value) in parameters {
        if name.starts_with("$$") {
            continue;
        }
        if name.starts_with('@') {
            return Err(QueryOptionError::UnsupportedParameter { name: name.clone() });
        }
        if name.starts_with('$') {
            if !system_options_allowed || !SYSTEM_QUERY_OPTIONS.contains(&name.as_str()) {
                return Err(QueryOptionError::UnsupportedSystemOption { name: name.clone() });
            }
        } else if name.starts_with("sap-") && !name.starts_with("sap-valid-") {
            return Err(QueryOptionError::UnsupportedCustomOption { name: name.clone() });
        }
        options.insert(name.clone(), value.clone());
    }
    Ok(options)
}

/// Extracts the `$$`-prefixed binding parameters named in `allowed`.
///
/// Group parameters must carry a valid group id. Any other `$$` key is an error.
pub fn build_binding_parameters(
    parameters: &BindingParameters,
    allowed: &[&str],
) -> Result<IndexMap<String, String>, QueryOptionError> {
    let mut result = IndexMap::new();
    for (name, value) in parameters.iter().filter(|(name, _)| name.starts_with("$$")) {
        if !allowed.contains(&name.as_str()) {
            return Err(QueryOptionError::UnsupportedBindingParameter { name: name.clone() });
        }
        let text = match value {
            Value::String(text) => text.clone(),
            other => {
                return Err(QueryOptionError::UnsupportedBindingParameterValue {
                    name: name.clone(),
                    value: other.to_string(),
                });
            }
        };
        if GROUP_PARAMETERS.contains(&name.as_str()) && text.parse::<GroupId>().is_err() {
            return Err(QueryOptionError::UnsupportedBindingParameterValue {
                name: name.clone(),
                value: text,
            });
        }
        result.insert(name.clone(), text);
    }
    Ok(result)
}

/// Merges model-wide URI parameters with binding query options; the binding wins on collision.
pub fn merge_query_options(uri_parameters: &IndexMap<String, String>, binding_options: &QueryOptions) -> QueryOptions {
    let mut merged: QueryOptions = uri_parameters
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    for (name, value) in binding_options {
        if merged.insert(name.clone(), value.clone()).is_some() {
            debug!(option = %name, "binding query option overrides model URI parameter");
        }
    }
    merged
}
