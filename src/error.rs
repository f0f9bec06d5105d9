use thiserror::Error;

use crate::model::VersionId;

/// Central error type for Verso operations.
#[derive(Error, Debug)]
pub enum VersoError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Version {version_id} not found for content '{content_id}'")]
    VersionNotFound {
        content_id: String,
        version_id: VersionId,
    },

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("No version of content '{0}' is published")]
    NothingPublished(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VersoError {
    pub fn version_not_found(content_id: &str, version_id: VersionId) -> Self {
        VersoError::VersionNotFound {
            content_id: content_id.to_string(),
            version_id,
        }
    }

    /// True for the 404 family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VersoError::VersionNotFound { .. }
                | VersoError::TagNotFound(_)
                | VersoError::NothingPublished(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, VersoError::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, VersoError::Validation(_))
    }
}

/// Convenience type alias for Verso results.
pub type VersoResult<T> = Result<T, VersoError>;
