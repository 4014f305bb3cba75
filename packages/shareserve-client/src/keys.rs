//! The query-key vocabulary: one constructor per logical resource.
//!
//! Every cacheable view in the app reads through one of these keys, and
//! every mutation declares its invalidations in terms of them. Keys are
//! the contract between readers and writers; constructing them ad hoc at
//! call sites is how under-invalidation bugs start.

use shareserve_sync::QueryKey;

pub const USER_PROFILE: &str = "user_profile";
pub const FIND_USERS: &str = "find_users";
pub const ALL_USERS: &str = "all_users";
pub const CONTACTS: &str = "contacts";
pub const PENDING_REQUESTS: &str = "pending_requests";
pub const CONVERSATION: &str = "conversation";
pub const USER_PHOTOS: &str = "user_photos";
pub const USER_VIDEOS: &str = "user_videos";

pub fn user_profile(username: &str) -> QueryKey {
    QueryKey::new(USER_PROFILE).param(username)
}

pub fn find_users(search_term: &str) -> QueryKey {
    QueryKey::new(FIND_USERS).param(search_term)
}

/// Prefix key addressing every cached search, whatever the term.
pub fn find_users_any() -> QueryKey {
    QueryKey::new(FIND_USERS)
}

pub fn all_users() -> QueryKey {
    QueryKey::new(ALL_USERS)
}

pub fn contacts(username: &str) -> QueryKey {
    QueryKey::new(CONTACTS).param(username)
}

pub fn pending_requests(username: &str) -> QueryKey {
    QueryKey::new(PENDING_REQUESTS).param(username)
}

/// A conversation as seen by `username` talking to `partner`. The two
/// directions are distinct keys; mutations touching a conversation
/// invalidate both.
pub fn conversation(username: &str, partner: &str) -> QueryKey {
    QueryKey::new(CONVERSATION).param(username).param(partner)
}

pub fn user_photos(username: &str) -> QueryKey {
    QueryKey::new(USER_PHOTOS).param(username)
}

pub fn user_videos(username: &str) -> QueryKey {
    QueryKey::new(USER_VIDEOS).param(username)
}
