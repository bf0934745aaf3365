//! Structural validation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ValidationError {
    #[error("invalid configuration structure: {}", .errors.join("; "))]
    Structural { errors: Vec<String> },

    #[error("failed to decode configuration: {message}")]
    Parse { message: String },
}

impl ValidationError {
    /// Collected structural problems (empty for parse failures)
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Structural { errors } => errors,
            Self::Parse { .. } => &[],
        }
    }
}

impl UserFacingError for ValidationError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Structural { .. } => Some(
                "A build needs at least one motherboard and one CPU, and every component section must be a list.",
            ),
            Self::Parse { .. } => Some("Check the field types of the component records."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::Structural { .. } => Some("validation.structural"),
            Self::Parse { .. } => Some("validation.parse"),
        }
    }
}
