//! Service error types.

use thiserror::Error;

/// Errors from the merge/revert family of operations.
///
/// `Validation` is rejected before any mutation. A revert that loses some
/// entities is NOT an error; it succeeds with warnings (see
/// [`crate::models::RevertOutcome`]).
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{scope} {id} is locked by a concurrent merge operation")]
    ConcurrentMergeConflict { scope: &'static str, id: i32 },
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("merge details payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
