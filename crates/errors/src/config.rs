//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("failed to write config to {path}: {error}")]
    WriteError { path: String, error: String },

    #[error("failed to serialize config: {error}")]
    SerializeError { error: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Provide a configuration file or drop --config to use the defaults.")
            }
            Self::InvalidValue { field, .. } => Some(match field.as_str() {
                "RACKFIT_BOTTLENECK_THRESHOLD" | "allocation.bottleneck_threshold" => {
                    "The bottleneck threshold is a ratio between 0.0 and 1.0."
                }
                _ => "Fix the configuration value and retry the command.",
            }),
            Self::ParseError { .. } => Some("Fix the configuration file syntax and retry."),
            Self::WriteError { .. } => Some("Ensure the config path is writable and retry."),
            Self::SerializeError { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("config.not_found"),
            Self::ParseError { .. } => Some("config.parse"),
            Self::InvalidValue { .. } => Some("config.invalid_value"),
            Self::WriteError { .. } => Some("config.write"),
            Self::SerializeError { .. } => Some("config.serialize"),
        }
    }
}
