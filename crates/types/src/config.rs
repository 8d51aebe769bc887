//! Model-level configuration shared by all bindings of one model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::group::{AUTO_GROUP_ID, GroupId, GroupIdError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid model configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    GroupId(#[from] GroupIdError),

    #[error("Invalid URI parameter '{key}': {reason}")]
    UriParameter { key: String, reason: String },
}

/// Defaults and protocol-level settings of the owning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelConfig {
    /// Group id used for reads and operation calls when a binding declares none.
    pub group_id: String,
    /// Group id used for modifications when a binding declares none.
    pub update_group_id: String,
    /// Passed through to every cache the bindings create.
    pub auto_expand_select: bool,
    /// Custom URI parameters added to every request; binding query options win on collision.
    pub uri_parameters: IndexMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            group_id: AUTO_GROUP_ID.to_string(),
            update_group_id: AUTO_GROUP_ID.to_string(),
            auto_expand_select: false,
            uri_parameters: IndexMap::new(),
        }
    }
}

impl ModelConfig {
    /// Parses and validates a JSON configuration. Missing members take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize, Default)]
        #[serde(rename_all = "camelCase", deny_unknown_fields, default)]
        struct PartialConfig {
            group_id: Option<String>,
            update_group_id: Option<String>,
            auto_expand_select: Option<bool>,
            uri_parameters: Option<IndexMap<String, String>>,
        }

        let partial: PartialConfig = serde_json::from_str(raw)?;
        let defaults = ModelConfig::default();
        let config = ModelConfig {
            group_id: partial.group_id.unwrap_or(defaults.group_id),
            update_group_id: partial.update_group_id.unwrap_or(defaults.update_group_id),
            auto_expand_select: partial.auto_expand_select.unwrap_or(defaults.auto_expand_select),
            uri_parameters: partial.uri_parameters.unwrap_or(defaults.uri_parameters),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.group_id.parse::<GroupId>()?;
        self.update_group_id.parse::<GroupId>()?;
        for key in self.uri_parameters.keys() {
            if key.starts_with('$') {
                return Err(ConfigError::UriParameter {
                    key: key.clone(),
                    reason: "system query options cannot be set model-wide".to_string(),
                });
            }
            if key.is_empty() {
                return Err(ConfigError::UriParameter {
                    key: key.clone(),
                    reason: "name must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_update_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.update_group_id = group_id.into();
        self
    }

    pub fn with_uri_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.uri_parameters.insert(key.into(), value.into());
        self
    }
}
