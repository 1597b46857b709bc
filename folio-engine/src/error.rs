//! Error types for the document engine.

use folio_model::{Operation, SchemaError};
use folio_storage::StorageError;
use folio_types::VersionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A validation failure scoped to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Bare field name; errors inside nested rows are not path-qualified.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("global not found: {0}")]
    GlobalNotFound(String),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("version not found: {collection}/{id}")]
    VersionNotFound { collection: String, id: VersionId },

    #[error("access denied: cannot {operation} in '{collection}'")]
    AccessDenied {
        operation: Operation,
        collection: String,
    },

    #[error("validation failed in '{collection}': {}", join_errors(.errors))]
    ValidationFailed {
        collection: String,
        errors: Vec<FieldError>,
    },

    /// A hook, access predicate or validator returned an error.
    #[error("callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn denied(operation: Operation, collection: &str) -> Self {
        Self::AccessDenied {
            operation,
            collection: collection.to_string(),
        }
    }

    /// True for every "does not exist" kind, including storage misses.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CollectionNotFound(_)
                | Self::GlobalNotFound(_)
                | Self::NotFound { .. }
                | Self::VersionNotFound { .. }
                | Self::Storage(StorageError::NotFound { .. })
        )
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Field errors of a validation failure, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::ValidationFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}
