//! Error types for the `fieldsim-tags` crate.

use fieldsim_types::CoercionError;

/// Errors returned by [`TagStore`](crate::TagStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A tag with this name already exists.
    #[error("tag already exists: {0}")]
    DuplicateName(String),

    /// No tag with this name exists.
    #[error("tag not found: {0}")]
    NotFound(String),

    /// The written value cannot be coerced into the tag's kind. The stored
    /// value is unchanged.
    #[error("type mismatch writing tag {tag}: {source}")]
    TypeMismatch {
        /// The tag that rejected the write.
        tag: String,
        /// The failed coercion.
        #[source]
        source: CoercionError,
    },
}
