//! Group identifiers controlling how requests are queued and sent.
//!
//! A group id is either absent (use the configured default), one of the reserved ids
//! `$auto` and `$direct`, or an application-defined batch name made of ASCII word
//! characters.

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reserved id for requests collected into an automatically submitted batch.
pub const AUTO_GROUP_ID: &str = "$auto";
/// Reserved id for requests sent immediately without batching.
pub const DIRECT_GROUP_ID: &str = "$direct";

static APPLICATION_GROUP_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid group id pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupIdError {
    #[error("Invalid group ID: {group_id}")]
    Invalid { group_id: String },
}

/// A validated group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupId {
    Auto,
    Direct,
    Application(String),
}

impl GroupId {
    pub fn as_str(&self) -> &str {
        match self {
            GroupId::Auto => AUTO_GROUP_ID,
            GroupId::Direct => DIRECT_GROUP_ID,
            GroupId::Application(name) => name,
        }
    }

    /// Returns `true` for the reserved `$auto` and `$direct` ids.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, GroupId::Application(_))
    }
}

impl FromStr for GroupId {
    type Err = GroupIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            AUTO_GROUP_ID => Ok(GroupId::Auto),
            DIRECT_GROUP_ID => Ok(GroupId::Direct),
            other if APPLICATION_GROUP_ID.is_match(other) => Ok(GroupId::Application(other.to_string())),
            other => Err(GroupIdError::Invalid { group_id: other.to_string() }),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Validates an optional group id; `None` always passes because it means "use the default".
pub fn validate_group_id(group_id: Option<&str>) -> Result<(), GroupIdError> {
    match group_id {
        Some(value) => value.parse::<GroupId>().map(|_| ()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reserved_and_application_ids() {
        assert_eq!("$auto".parse::<GroupId>().expect("auto"), GroupId::Auto);
        assert_eq!("$direct".parse::<GroupId>().expect("direct"), GroupId::Direct);
        assert_eq!(
            "updateGroup_1".parse::<GroupId>().expect("application"),
            GroupId::Application("updateGroup_1".into())
        );
        assert!(GroupId::Auto.is_reserved());
        assert!(!GroupId::Application("x".into()).is_reserved());
    }

    #[test]
    fn rejects_malformed_ids() {
        for candidate in ["", "$batch", "my group", "grüppe", "a-b"] {
            let error = candidate.parse::<GroupId>().expect_err(candidate);
            assert_eq!(error.to_string(), format!("Invalid group ID: {}", candidate));
        }
    }

    #[test]
    fn absent_group_id_is_valid() {
        assert!(validate_group_id(None).is_ok());
        assert!(validate_group_id(Some("$auto")).is_ok());
        assert!(validate_group_id(Some("$foo")).is_err());
    }
}
