//! Error types for tree operations.

use thiserror::Error;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Precondition violations reported by [`AvlTree`](crate::AvlTree).
///
/// None of these are retryable. A failed operation leaves the tree untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The key to insert is already present.
    #[error("key already exists")]
    KeyAlreadyExists,

    /// The key addressed by a delete or split is not in the tree.
    #[error("node not in tree")]
    NodeNotInTree,

    /// The separator key of a join does not lie strictly between the two trees.
    #[error("invalid join: separator key must lie strictly between both trees")]
    InvalidJoinPrecondition,
}
