//! The backend collaborator trait.
//!
//! The actual transport (actor calls, HTTP, an in-memory double) lives
//! behind [`BackendClient`]. The contract the sync layer relies on:
//! operations are safely callable multiple times (queries refetch and
//! retry), and failure is reported by `Err`, never by an ambiguous "ok"
//! sentinel: a login with bad credentials is `Unauthorized`, not
//! `Ok(false)`.

use async_trait::async_trait;
use thiserror::Error;

use shareserve_sync::SyncError;

use crate::types::{ChatMessage, MediaItem, UserProfile};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Backend operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend connection is not established yet.
    #[error("backend not available")]
    Unavailable,

    /// The caller is not allowed to perform the operation (including
    /// failed logins).
    #[error("unauthorized")]
    Unauthorized,

    /// The addressed resource does not exist.
    #[error("not found")]
    NotFound,

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded the backend's own deadline.
    #[error("request timed out")]
    Timeout,

    /// The backend refused the operation (validation, conflicts).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<BackendError> for SyncError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout => SyncError::Timeout("backend request timed out".to_string()),
            other => SyncError::Backend(other.to_string()),
        }
    }
}

/// The remote ShareServe backend.
///
/// Every operation is an asynchronous call returning a typed result or a
/// [`BackendError`]. Implementations should enforce their own transport
/// timeout; the caching layer propagates a timeout rejection like any
/// other error.
#[async_trait]
pub trait BackendClient: Send + Sync {
    // ---- Auth ----

    async fn register_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
        bio: &str,
    ) -> Result<()>;

    /// Authenticate. Bad credentials are `Err(Unauthorized)`.
    async fn login_user(&self, username: &str, password: &str) -> Result<()>;

    // ---- Profiles ----

    async fn get_user_profile(&self, username: &str) -> Result<UserProfile>;

    async fn update_user_profile(
        &self,
        username: &str,
        display_name: &str,
        bio: &str,
    ) -> Result<()>;

    async fn find_users_by_username(&self, search_term: &str) -> Result<Vec<UserProfile>>;

    async fn get_all_users(&self) -> Result<Vec<UserProfile>>;

    // ---- Contacts ----

    async fn get_contacts(&self, username: &str) -> Result<Vec<UserProfile>>;

    async fn get_pending_contact_requests(&self, username: &str) -> Result<Vec<UserProfile>>;

    async fn send_contact_request(&self, sender: &str, target: &str) -> Result<()>;

    async fn accept_contact_request(&self, username: &str, requester: &str) -> Result<()>;

    async fn decline_contact_request(&self, username: &str, requester: &str) -> Result<()>;

    // ---- Messaging ----

    async fn get_conversation(&self, username: &str, partner: &str) -> Result<Vec<ChatMessage>>;

    async fn send_message(&self, sender: &str, receiver: &str, text: &str) -> Result<()>;

    // ---- Media ----

    async fn get_user_photos(&self, username: &str) -> Result<Vec<MediaItem>>;

    async fn get_user_videos(&self, username: &str) -> Result<Vec<MediaItem>>;

    async fn share_photo(&self, username: &str, item: MediaItem) -> Result<()>;

    async fn share_video(&self, username: &str, item: MediaItem) -> Result<()>;
}
