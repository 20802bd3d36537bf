//! Store-level error taxonomy.
//!
//! Transport failures are wrapped in `StoreError::Remote`; callers that need
//! the HTTP-level detail can walk the `anyhow` chain for an
//! [`ApiError`](crate::api::ApiError). `StoreError` is `Clone` because a
//! coalesced fetch hands the same outcome to every waiter.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A mutation of the same class is already executing. Recoverable:
    /// surface a warning and let the user retry once the first one settles.
    #[error("another {0} operation is already in progress")]
    DuplicateOperation(String),

    /// The target record is not in the local list. Non-fatal: the trailing
    /// re-fetch after every mutation repairs the list.
    #[error("salary record {0} is not in the local list")]
    NotFound(i64),

    /// The cumulative contributions metric is scoped to a single person.
    #[error("a person must be selected to load cumulative contributions")]
    PersonRequired,

    /// Network or server failure, propagated from the transport.
    #[error("{0}")]
    Remote(Arc<anyhow::Error>),
}

impl StoreError {
    pub fn remote(err: anyhow::Error) -> Self {
        StoreError::Remote(Arc::new(err))
    }

    /// True for guard rejections, which callers should treat as a warning
    /// rather than a hard failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateOperation(_))
    }
}
