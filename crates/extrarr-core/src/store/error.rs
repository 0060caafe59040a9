//! Store error type.

use thiserror::Error;

/// Errors returned by [`Store`](super::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Scalar or hash field is absent.
    #[error("key not found: {key}")]
    NotFound { key: String },
    /// `lset` addressed an index outside `[0, len)` after tail-relative resolution.
    #[error("index {index} out of range for list {key} (len {len})")]
    IndexOutOfRange { key: String, index: i64, len: usize },
    #[error("sqlite: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state dir: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),
}

impl StoreError {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
