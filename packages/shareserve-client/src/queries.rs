//! Typed read access to backend state.
//!
//! Each method builds a [`QueryHandle`] for one logical view. Queries
//! whose required parameters are not available yet (an authenticated
//! username populating after startup, an empty search box) are built
//! disabled: they never run their fetcher and simply serve whatever the
//! shared cache already holds.

use std::sync::Arc;
use std::time::Duration;

use shareserve_sync::{QueryCache, QueryHandle, QueryOptions};

use crate::backend::{BackendClient, BackendError};
use crate::keys;
use crate::types::{ChatMessage, MediaItem, UserProfile};

/// Poll cadence for the mounted conversation view.
pub const CONVERSATION_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// The application facade: a query cache plus the backend collaborator.
///
/// Cheap to clone; all clones share one cache, so every view reading the
/// same key sees one fetch and one result.
#[derive(Clone)]
pub struct ShareServe {
    cache: QueryCache,
    backend: Arc<dyn BackendClient>,
}

impl ShareServe {
    /// Build a facade with a fresh cache.
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self::with_cache(backend, QueryCache::new())
    }

    /// Build a facade over an existing cache (shared app-wide state, or
    /// an isolated instance in tests).
    pub fn with_cache(backend: Arc<dyn BackendClient>, cache: QueryCache) -> Self {
        Self { cache, backend }
    }

    /// The shared cache, for embedders that need direct invalidation or
    /// sweeping.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub(crate) fn backend(&self) -> Arc<dyn BackendClient> {
        Arc::clone(&self.backend)
    }

    /// A user's profile. Resolves to `None` while the username is unknown
    /// or when no such user exists.
    pub fn user_profile(&self, username: Option<&str>) -> QueryHandle<Option<UserProfile>> {
        let enabled = username.is_some();
        let username = username.map(str::to_string);
        let key = keys::user_profile(username.as_deref().unwrap_or(""));
        let backend = self.backend();
        self.cache.query(
            key,
            move || {
                let backend = Arc::clone(&backend);
                let username = username.clone();
                async move {
                    let Some(username) = username else {
                        return Ok(None);
                    };
                    match backend.get_user_profile(&username).await {
                        Ok(profile) => Ok(Some(profile)),
                        Err(BackendError::NotFound) => Ok(None),
                        Err(err) => Err(err.into()),
                    }
                }
            },
            QueryOptions::default().enabled(enabled),
        )
    }

    /// Username search. Blank terms leave the query disabled.
    pub fn find_users(&self, search_term: &str) -> QueryHandle<Vec<UserProfile>> {
        let enabled = !search_term.trim().is_empty();
        let term = search_term.trim().to_string();
        let backend = self.backend();
        self.cache.query(
            keys::find_users(&term),
            move || {
                let backend = Arc::clone(&backend);
                let term = term.clone();
                async move {
                    if term.is_empty() {
                        return Ok(Vec::new());
                    }
                    backend
                        .find_users_by_username(&term)
                        .await
                        .map_err(Into::into)
                }
            },
            QueryOptions::default().enabled(enabled),
        )
    }

    /// The full user directory (suggestions, discovery).
    pub fn all_users(&self) -> QueryHandle<Vec<UserProfile>> {
        let backend = self.backend();
        self.cache.query(
            keys::all_users(),
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.get_all_users().await.map_err(Into::into) }
            },
            QueryOptions::default(),
        )
    }

    /// The signed-in user's contact list.
    pub fn contacts(&self, username: Option<&str>) -> QueryHandle<Vec<UserProfile>> {
        self.user_list_query(username, keys::CONTACTS, |backend, username| async move {
            backend.get_contacts(&username).await
        })
    }

    /// Incoming contact requests awaiting a decision.
    pub fn pending_requests(&self, username: Option<&str>) -> QueryHandle<Vec<UserProfile>> {
        self.user_list_query(
            username,
            keys::PENDING_REQUESTS,
            |backend, username| async move {
                backend.get_pending_contact_requests(&username).await
            },
        )
    }

    /// The conversation between `username` and `partner`, polled every
    /// [`CONVERSATION_POLL_INTERVAL`] while the handle is alive.
    pub fn conversation(
        &self,
        username: Option<&str>,
        partner: Option<&str>,
    ) -> QueryHandle<Vec<ChatMessage>> {
        let enabled = username.is_some() && partner.is_some();
        let me = username.unwrap_or("").to_string();
        let other = partner.unwrap_or("").to_string();
        let backend = self.backend();
        let (fetch_me, fetch_other) = (me.clone(), other.clone());
        self.cache.query(
            keys::conversation(&me, &other),
            move || {
                let backend = Arc::clone(&backend);
                let me = fetch_me.clone();
                let other = fetch_other.clone();
                async move {
                    backend
                        .get_conversation(&me, &other)
                        .await
                        .map_err(Into::into)
                }
            },
            QueryOptions::default()
                .enabled(enabled)
                .refetch_interval(CONVERSATION_POLL_INTERVAL),
        )
    }

    /// Photos shared by a user.
    pub fn user_photos(&self, username: Option<&str>) -> QueryHandle<Vec<MediaItem>> {
        self.media_query(username, keys::USER_PHOTOS, |backend, username| async move {
            backend.get_user_photos(&username).await
        })
    }

    /// Videos shared by a user.
    pub fn user_videos(&self, username: Option<&str>) -> QueryHandle<Vec<MediaItem>> {
        self.media_query(username, keys::USER_VIDEOS, |backend, username| async move {
            backend.get_user_videos(&username).await
        })
    }

    fn user_list_query<F, Fut>(
        &self,
        username: Option<&str>,
        resource: &'static str,
        op: F,
    ) -> QueryHandle<Vec<UserProfile>>
    where
        F: Fn(Arc<dyn BackendClient>, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::backend::Result<Vec<UserProfile>>>
            + Send
            + 'static,
    {
        let enabled = username.is_some();
        let username = username.unwrap_or("").to_string();
        let backend = self.backend();
        self.cache.query(
            shareserve_sync::QueryKey::new(resource).param(&username),
            move || {
                let fut = op(Arc::clone(&backend), username.clone());
                async move { fut.await.map_err(Into::into) }
            },
            QueryOptions::default().enabled(enabled),
        )
    }

    fn media_query<F, Fut>(
        &self,
        username: Option<&str>,
        resource: &'static str,
        op: F,
    ) -> QueryHandle<Vec<MediaItem>>
    where
        F: Fn(Arc<dyn BackendClient>, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::backend::Result<Vec<MediaItem>>> + Send + 'static,
    {
        let enabled = username.is_some();
        let username = username.unwrap_or("").to_string();
        let backend = self.backend();
        self.cache.query(
            shareserve_sync::QueryKey::new(resource).param(&username),
            move || {
                let fut = op(Arc::clone(&backend), username.clone());
                async move { fut.await.map_err(Into::into) }
            },
            QueryOptions::default().enabled(enabled),
        )
    }
}

impl std::fmt::Debug for ShareServe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareServe")
            .field("cache", &self.cache)
            .finish()
    }
}
