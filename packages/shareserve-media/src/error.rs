//! Error types for media resolution.

use thiserror::Error;

/// Result type for media operations.
pub type Result<T> = std::result::Result<T, MediaError>;

/// Media resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The prompt was empty or whitespace-only. Attempts must be rejected
    /// before resolution runs.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The catalog configuration could not be parsed.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Resolution produced nothing to try: no endpoint configured and the
    /// catalog is empty.
    #[error("no candidates available")]
    NoCandidates,
}
