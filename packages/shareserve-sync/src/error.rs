//! Error types for the synchronization layer.

use thiserror::Error;

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Synchronization layer errors.
///
/// Errors are plain values: queries surface them in [`crate::QueryState`],
/// mutations through the rejected result of
/// [`crate::MutationRun::join`]. They are `Clone` so that every subscriber
/// joined to one shared fetch observes the same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The backend collaborator rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The fetcher or action reported a timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A failure inside the layer itself (e.g. a mutation task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}
