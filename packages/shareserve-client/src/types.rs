//! Domain types shared across queries, mutations, and the backend trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: String,
    pub profile_number: u64,
}

/// One message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// A shared photo or video, addressed by URL.
///
/// Media is stored out-of-band (the blob-by-URL model); the client layer
/// only ever moves locators around, including ones produced by the media
/// fallback resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
}

impl MediaItem {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
