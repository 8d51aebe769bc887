//! Operation metadata in CSDL JSON shape.
//!
//! Only the members needed to call an operation are modelled. Unknown members are ignored
//! so that full metadata documents deserialize without loss of the relevant parts.

use serde::{Deserialize, Serialize};

/// Kind of a callable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Action,
    Function,
}

/// A single declared operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParameter {
    #[serde(rename = "$Name")]
    pub name: String,
    /// Qualified type name, e.g. `Edm.String`.
    #[serde(rename = "$Type")]
    pub type_name: String,
    #[serde(rename = "$IsCollection", default)]
    pub is_collection: bool,
    #[serde(rename = "$Nullable", default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReturnType {
    #[serde(rename = "$Type")]
    pub type_name: String,
    #[serde(rename = "$IsCollection", default)]
    pub is_collection: bool,
}

/// One overload of an action or function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetadata {
    #[serde(rename = "$kind")]
    pub kind: OperationKind,
    #[serde(rename = "$IsBound", default)]
    pub is_bound: bool,
    /// Parameters in declaration order. For bound operations the first one is the binding parameter.
    #[serde(rename = "$Parameter", default)]
    pub parameters: Vec<OperationParameter>,
    #[serde(rename = "$ReturnType", default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<OperationReturnType>,
}

impl OperationMetadata {
    pub fn is_action(&self) -> bool {
        self.kind == OperationKind::Action
    }
}
