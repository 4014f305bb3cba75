//! Testing utilities: an in-memory backend double.
//!
//! `InMemoryBackend` implements the full [`BackendClient`] surface over
//! process memory, records per-operation call counts (so tests can assert
//! fetch deduplication and invalidation-driven refetches), and can be
//! flipped offline to exercise error paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::backend::{BackendClient, BackendError, Result};
use crate::types::{ChatMessage, MediaItem, UserProfile};

#[derive(Default)]
struct State {
    users: BTreeMap<String, UserProfile>,
    passwords: HashMap<String, String>,
    contacts: HashMap<String, BTreeSet<String>>,
    pending: HashMap<String, Vec<String>>,
    conversations: HashMap<(String, String), Vec<ChatMessage>>,
    photos: HashMap<String, Vec<MediaItem>>,
    videos: HashMap<String, Vec<MediaItem>>,
}

/// In-memory [`BackendClient`] double.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    calls: Mutex<HashMap<&'static str, usize>>,
    offline: AtomicBool,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user with a password.
    pub fn with_user(self, profile: UserProfile, password: &str) -> Self {
        {
            let mut state = self.state_mut();
            state
                .passwords
                .insert(profile.username.clone(), password.to_string());
            state.users.insert(profile.username.clone(), profile);
        }
        self
    }

    /// Seed an established (mutual) contact relationship.
    pub fn with_contact(self, a: &str, b: &str) -> Self {
        {
            let mut state = self.state_mut();
            state
                .contacts
                .entry(a.to_string())
                .or_default()
                .insert(b.to_string());
            state
                .contacts
                .entry(b.to_string())
                .or_default()
                .insert(a.to_string());
        }
        self
    }

    /// How many times the named operation ran.
    pub fn calls(&self, op: &str) -> usize {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(op)
            .unwrap_or(&0)
    }

    /// Make every subsequent operation fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn state_mut(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: &'static str) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_insert(0) += 1;
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Network("offline".to_string()));
        }
        Ok(())
    }

    fn profiles_for(state: &State, usernames: impl IntoIterator<Item = String>) -> Vec<UserProfile> {
        usernames
            .into_iter()
            .filter_map(|name| state.users.get(&name).cloned())
            .collect()
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn register_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
        bio: &str,
    ) -> Result<()> {
        self.record("register_user")?;
        let mut state = self.state_mut();
        if state.users.contains_key(username) {
            return Err(BackendError::Rejected("username taken".to_string()));
        }
        state
            .passwords
            .insert(username.to_string(), password.to_string());
        let profile_number = state.users.len() as u64 + 1;
        state.users.insert(
            username.to_string(),
            UserProfile {
                username: username.to_string(),
                display_name: display_name.to_string(),
                bio: bio.to_string(),
                avatar_url: String::new(),
                profile_number,
            },
        );
        Ok(())
    }

    async fn login_user(&self, username: &str, password: &str) -> Result<()> {
        self.record("login_user")?;
        let state = self.state_mut();
        match state.passwords.get(username) {
            Some(stored) if stored == password => Ok(()),
            _ => Err(BackendError::Unauthorized),
        }
    }

    async fn get_user_profile(&self, username: &str) -> Result<UserProfile> {
        self.record("get_user_profile")?;
        self.state_mut()
            .users
            .get(username)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn update_user_profile(
        &self,
        username: &str,
        display_name: &str,
        bio: &str,
    ) -> Result<()> {
        self.record("update_user_profile")?;
        let mut state = self.state_mut();
        let profile = state.users.get_mut(username).ok_or(BackendError::NotFound)?;
        profile.display_name = display_name.to_string();
        profile.bio = bio.to_string();
        Ok(())
    }

    async fn find_users_by_username(&self, search_term: &str) -> Result<Vec<UserProfile>> {
        self.record("find_users_by_username")?;
        let term = search_term.to_lowercase();
        let state = self.state_mut();
        Ok(state
            .users
            .values()
            .filter(|p| p.username.to_lowercase().contains(&term))
            .cloned()
            .collect())
    }

    async fn get_all_users(&self) -> Result<Vec<UserProfile>> {
        self.record("get_all_users")?;
        Ok(self.state_mut().users.values().cloned().collect())
    }

    async fn get_contacts(&self, username: &str) -> Result<Vec<UserProfile>> {
        self.record("get_contacts")?;
        let state = self.state_mut();
        let names: Vec<String> = state
            .contacts
            .get(username)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Self::profiles_for(&state, names))
    }

    async fn get_pending_contact_requests(&self, username: &str) -> Result<Vec<UserProfile>> {
        self.record("get_pending_contact_requests")?;
        let state = self.state_mut();
        let names: Vec<String> = state.pending.get(username).cloned().unwrap_or_default();
        Ok(Self::profiles_for(&state, names))
    }

    async fn send_contact_request(&self, sender: &str, target: &str) -> Result<()> {
        self.record("send_contact_request")?;
        let mut state = self.state_mut();
        if !state.users.contains_key(target) {
            return Err(BackendError::NotFound);
        }
        let pending = state.pending.entry(target.to_string()).or_default();
        if !pending.iter().any(|existing| existing == sender) {
            pending.push(sender.to_string());
        }
        Ok(())
    }

    async fn accept_contact_request(&self, username: &str, requester: &str) -> Result<()> {
        self.record("accept_contact_request")?;
        let mut state = self.state_mut();
        let pending = state.pending.entry(username.to_string()).or_default();
        let Some(position) = pending.iter().position(|name| name == requester) else {
            return Err(BackendError::Rejected("no such request".to_string()));
        };
        pending.remove(position);
        state
            .contacts
            .entry(username.to_string())
            .or_default()
            .insert(requester.to_string());
        state
            .contacts
            .entry(requester.to_string())
            .or_default()
            .insert(username.to_string());
        Ok(())
    }

    async fn decline_contact_request(&self, username: &str, requester: &str) -> Result<()> {
        self.record("decline_contact_request")?;
        let mut state = self.state_mut();
        let pending = state.pending.entry(username.to_string()).or_default();
        let Some(position) = pending.iter().position(|name| name == requester) else {
            return Err(BackendError::Rejected("no such request".to_string()));
        };
        pending.remove(position);
        Ok(())
    }

    async fn get_conversation(&self, username: &str, partner: &str) -> Result<Vec<ChatMessage>> {
        self.record("get_conversation")?;
        let state = self.state_mut();
        Ok(state
            .conversations
            .get(&pair_key(username, partner))
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, sender: &str, receiver: &str, text: &str) -> Result<()> {
        self.record("send_message")?;
        let mut state = self.state_mut();
        if !state.users.contains_key(receiver) {
            return Err(BackendError::NotFound);
        }
        state
            .conversations
            .entry(pair_key(sender, receiver))
            .or_default()
            .push(ChatMessage {
                sender: sender.to_string(),
                content: text.to_string(),
                sent_at: Utc::now(),
            });
        Ok(())
    }

    async fn get_user_photos(&self, username: &str) -> Result<Vec<MediaItem>> {
        self.record("get_user_photos")?;
        Ok(self
            .state_mut()
            .photos
            .get(username)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_user_videos(&self, username: &str) -> Result<Vec<MediaItem>> {
        self.record("get_user_videos")?;
        Ok(self
            .state_mut()
            .videos
            .get(username)
            .cloned()
            .unwrap_or_default())
    }

    async fn share_photo(&self, username: &str, item: MediaItem) -> Result<()> {
        self.record("share_photo")?;
        self.state_mut()
            .photos
            .entry(username.to_string())
            .or_default()
            .push(item);
        Ok(())
    }

    async fn share_video(&self, username: &str, item: MediaItem) -> Result<()> {
        self.record("share_video")?;
        self.state_mut()
            .videos
            .entry(username.to_string())
            .or_default()
            .push(item);
        Ok(())
    }
}

/// A seeded profile for tests.
pub fn profile(username: &str) -> UserProfile {
    UserProfile {
        username: username.to_string(),
        display_name: username.to_string(),
        bio: String::new(),
        avatar_url: String::new(),
        profile_number: 0,
    }
}
