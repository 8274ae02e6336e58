//! Boundary error model.

use thiserror::Error;

/// Result type returned by store and issuance adapters.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error reported by a persistence or issuance collaborator.
///
/// Adapters classify their concrete failures into exactly one of these two
/// kinds. Callers never look at the adapter's own error representation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced record (or filtered set) does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Any other failure: I/O, constraint violation, generation failure.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The human-readable detail, without the kind.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m) | Self::Backend(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_bare_message() {
        assert_eq!(StoreError::not_found("record not found").to_string(), "record not found");
        assert_eq!(StoreError::backend("connection reset").to_string(), "connection reset");
    }

    #[test]
    fn kind_predicates() {
        assert!(StoreError::not_found("x").is_not_found());
        assert!(!StoreError::backend("x").is_not_found());
        assert_eq!(StoreError::backend("boom").message(), "boom");
    }
}
