//! Resource allocation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ResourceError {
    #[error("insufficient {resource}: requested {requested}, available {available}")]
    Exhausted {
        resource: String,
        requested: u32,
        available: u32,
    },
}

impl ResourceError {
    /// Create an exhaustion error for the given resource label
    pub fn exhausted(resource: impl Into<String>, requested: u32, available: u32) -> Self {
        Self::Exhausted {
            resource: resource.into(),
            requested,
            available,
        }
    }

    /// Number of units the caller asked for
    #[must_use]
    pub fn requested(&self) -> u32 {
        match self {
            Self::Exhausted { requested, .. } => *requested,
        }
    }

    /// Number of compatible units that were free when the request failed
    #[must_use]
    pub fn available(&self) -> u32 {
        match self {
            Self::Exhausted { available, .. } => *available,
        }
    }
}

impl UserFacingError for ResourceError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Exhausted { .. } => Some(
                "Remove a component that uses this resource or add hardware that provides more of it.",
            ),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::Exhausted { .. } => Some("resource.exhausted"),
        }
    }
}
