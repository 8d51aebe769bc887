//! Resolution of operation metadata for deferred operation bindings.

use std::sync::Arc;

use bindery_types::OperationMetadata;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{BindingError, SyncResult},
    model::MetaModel,
    promise::SyncPromise,
};

/// Resolves the single overload of the operation called `name`.
///
/// A direct action or function is used as is; an action or function import is followed to
/// the operation it names. Anything else fails, and so does any number of overloads other
/// than one.
pub fn resolve_operation_metadata(meta_model: Arc<dyn MetaModel>, name: &str) -> SyncPromise<OperationMetadata> {
    let operation_name = name.to_string();
    let lookup = Arc::clone(&meta_model);
    meta_model
        .fetch_object(&format!("/{}", name))
        .then(move |found| {
            let Some(found) = found else {
                return SyncPromise::reject(BindingError::UnknownOperation { name: operation_name });
            };
            if is_overload_list(&found) {
                return SyncPromise::resolve(Some(found));
            }
            let target = match found.get("$kind").and_then(Value::as_str) {
                Some("ActionImport") => found.get("$Action"),
                Some("FunctionImport") => found.get("$Function"),
                _ => return SyncPromise::reject(BindingError::NotAnOperation { name: operation_name }),
            };
            match target.and_then(Value::as_str) {
                Some(target) => {
                    debug!(import = %operation_name, operation = %target, "following operation import");
                    lookup.fetch_object(&format!("/{}", target))
                }
                None => SyncPromise::reject(BindingError::InvalidMetadata {
                    name: operation_name,
                    reason: "import does not name its operation".to_string(),
                }),
            }
        })
        .and_then({
            let name = name.to_string();
            move |overloads| single_overload(&name, overloads)
        })
}

fn is_overload_list(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|overloads| overloads.first())
        .and_then(|first| first.get("$kind"))
        .and_then(Value::as_str)
        .is_some_and(|kind| kind == "Action" || kind == "Function")
}

fn single_overload(name: &str, overloads: Option<Value>) -> SyncResult<OperationMetadata> {
    let overloads = match overloads {
        Some(Value::Array(overloads)) => overloads,
        Some(_) => return Err(BindingError::NotAnOperation { name: name.to_string() }),
        None => return Err(BindingError::UnknownOperation { name: name.to_string() }),
    };
    let [overload] = <[Value; 1]>::try_from(overloads).map_err(|_| BindingError::OperationOverloading { name: name.to_string() })?;
    serde_json::from_value(overload).map_err(|error| BindingError::InvalidMetadata {
        name: name.to_string(),
        reason: error.to_string(),
    })
}

/// A [`MetaModel`] over a CSDL JSON metadata document.
///
/// Paths are `/<qualified name>` for schema children and `/<name>` for children of the
/// entity container. Lookups are synchronous.
#[derive(Debug, Clone)]
pub struct JsonMetaModel {
    document: Value,
}

impl JsonMetaModel {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        if let Some(found) = self.document.get(name) {
            return Some(found);
        }
        let container = self.document.get("$EntityContainer")?.as_str()?;
        self.document.get(container)?.get(name)
    }
}

impl MetaModel for JsonMetaModel {
    fn fetch_object(&self, path: &str) -> SyncPromise<Option<Value>> {
        let name = path.trim_start_matches('/');
        SyncPromise::resolve(self.lookup(name).cloned())
    }
}
