//! Error types for tirea-form operations.
//!
//! These are structural (programmer) errors. Validation failures are never
//! errors: they are [`Issue`](crate::Issue) values attached to field state.

use crate::{FieldKey, Path};
use thiserror::Error;

/// Result type alias for tirea-form operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors that can occur while building, addressing or reducing a form.
#[derive(Debug, Error)]
pub enum FormError {
    /// A string path item is empty or contains `.`, `[` or `]`.
    #[error("invalid string path item {item:?}")]
    InvalidStringPathItem {
        /// The offending item.
        item: String,
    },

    /// A bracketed path item is not a non-negative integer.
    #[error("invalid number path item {item:?}")]
    InvalidNumberPathItem {
        /// The offending item.
        item: String,
    },

    /// The same field node occurs at more than one position in the tree.
    #[error("field {key} is reused at '{first}' and '{second}'")]
    ReusedField {
        /// Identity key of the reused node.
        key: FieldKey,
        /// First position the node was found at.
        first: Path,
        /// Second position the node was found at.
        second: Path,
    },

    /// A field node is not part of the tree.
    #[error("field {key} not found in the field tree")]
    FieldNotFound {
        /// Identity key of the missing node.
        key: FieldKey,
    },

    /// No node exists at the given path.
    #[error("path not found: '{path}'")]
    PathNotFound {
        /// The path that was not found.
        path: Path,
    },

    /// Two entries of one object share a name.
    #[error("duplicate key {key:?} at '{path}'")]
    DuplicateKey {
        /// Path of the object holding the duplicates.
        path: Path,
        /// The duplicated key.
        key: String,
    },

    /// A state entry is missing for a key that the tree references.
    #[error("missing state for key {key}")]
    MissingKey {
        /// Debug rendering of the key.
        key: String,
    },

    /// A dispatch was started while another one was still running.
    #[error("re-entrant dispatch: a transition is already in progress")]
    ReentrantDispatch,

    /// Invalid operation error.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of what went wrong.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FormError {
    /// Create an invalid string path item error.
    #[inline]
    pub fn invalid_string_item(item: impl Into<String>) -> Self {
        FormError::InvalidStringPathItem { item: item.into() }
    }

    /// Create an invalid number path item error.
    #[inline]
    pub fn invalid_number_item(item: impl Into<String>) -> Self {
        FormError::InvalidNumberPathItem { item: item.into() }
    }

    /// Create a reused field error.
    #[inline]
    pub fn reused_field(key: FieldKey, first: Path, second: Path) -> Self {
        FormError::ReusedField { key, first, second }
    }

    /// Create a field not found error.
    #[inline]
    pub fn field_not_found(key: FieldKey) -> Self {
        FormError::FieldNotFound { key }
    }

    /// Create a path not found error.
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        FormError::PathNotFound { path }
    }

    /// Create a duplicate key error.
    #[inline]
    pub fn duplicate_key(path: Path, key: impl Into<String>) -> Self {
        FormError::DuplicateKey {
            path,
            key: key.into(),
        }
    }

    /// Create a missing key error from any debuggable key.
    #[inline]
    pub fn missing_key(key: &impl std::fmt::Debug) -> Self {
        FormError::MissingKey {
            key: format!("{key:?}"),
        }
    }

    /// Create an invalid operation error.
    #[inline]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        FormError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors that indicate the state map and the tree
    /// drifted apart.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FormError::ReusedField { .. }
                | FormError::FieldNotFound { .. }
                | FormError::MissingKey { .. }
                | FormError::DuplicateKey { .. }
        )
    }
}
