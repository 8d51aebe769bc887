//! Formatting of typed values as URL literals.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use thiserror::Error;

/// Characters left unescaped by a URI component encoder: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("Unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("Illegal value for type {type_name}: {value}")]
    IllegalValue { type_name: String, value: String },
}

/// Percent-encodes a single URI component.
pub fn encode_uri_component(raw: &str) -> String {
    utf8_percent_encode(raw, URI_COMPONENT).to_string()
}

/// Formats `value` as a literal of the given primitive type.
///
/// `null` is always the `null` literal. Strings are quoted with embedded quotes doubled;
/// binary and duration values get their type prefix; numeric, boolean, date and time
/// types are written verbatim.
pub fn format_literal(value: &Value, type_name: &str) -> Result<String, LiteralError> {
    if value.is_null() {
        return Ok("null".to_string());
    }
    let text = || plain_text(value, type_name);
    match type_name {
        "Edm.Binary" => Ok(format!("binary'{}'", text()?)),
        "Edm.Boolean" | "Edm.Byte" | "Edm.Double" | "Edm.Int16" | "Edm.Int32" | "Edm.SByte" | "Edm.Single" => text(),
        "Edm.Date" | "Edm.DateTimeOffset" | "Edm.Decimal" | "Edm.Guid" | "Edm.Int64" | "Edm.TimeOfDay" => text(),
        "Edm.Duration" => Ok(format!("duration'{}'", text()?)),
        "Edm.String" => match value {
            Value::String(raw) => Ok(format!("'{}'", raw.replace('\'', "''"))),
            other => Err(illegal(other, type_name)),
        },
        _ => Err(LiteralError::UnsupportedType {
            type_name: type_name.to_string(),
        }),
    }
}

fn plain_text(value: &Value, type_name: &str) -> Result<String, LiteralError> {
    match value {
        Value::String(raw) => Ok(raw.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(illegal(other, type_name)),
    }
}

fn illegal(value: &Value, type_name: &str) -> LiteralError {
    LiteralError::IllegalValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    }
}
