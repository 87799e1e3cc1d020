//! Content model error types.

use thiserror::Error;
use uuid::Uuid;

use super::validation::{ErrorCode, ValidationErrors};

/// Errors raised by content operations and the stores beneath them.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The save was rejected; nothing was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// A storage-level uniqueness constraint rejected the write.
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    /// The tree root cannot be moved, deleted or re-parented.
    #[error("the root page cannot be {0}")]
    RootImmutable(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContentError {
    /// Shorthand for a single-field validation failure.
    pub fn field(field: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        ContentError::Validation(ValidationErrors::single(field, code, message))
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        ContentError::NotFound { entity, id }
    }

    /// Field-level errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ContentError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, ContentError::UniqueViolation { .. })
    }
}

impl From<ValidationErrors> for ContentError {
    fn from(errors: ValidationErrors) -> Self {
        ContentError::Validation(errors)
    }
}

/// Result alias for content operations.
pub type ContentResult<T> = Result<T, ContentError>;
