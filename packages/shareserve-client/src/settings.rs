//! Local app settings.
//!
//! Settings are device-local preferences, not server state, so they live
//! outside the query cache. The store persists them as a JSON string
//! (whatever key-value storage the host platform offers); unknown or
//! missing fields fall back to defaults, so older persisted blobs keep
//! loading.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

fn default_true() -> bool {
    true
}

/// Device-local preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub autoplay_videos: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            notifications: true,
            autoplay_videos: false,
        }
    }
}

/// Persistent storage for the serialized settings blob.
pub trait SettingsStore: Send + Sync {
    /// The stored blob, if any.
    fn load(&self) -> Option<String>;

    /// Replace the stored blob. Storage failures are the store's problem;
    /// settings keep working in memory.
    fn save(&self, json: &str);
}

/// A store that lives and dies with the process.
#[derive(Default)]
pub struct InMemorySettingsStore {
    slot: Mutex<Option<String>>,
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, json: &str) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(json.to_string());
    }
}

/// Live settings backed by a store.
#[derive(Clone)]
pub struct SettingsHandle {
    store: Arc<dyn SettingsStore>,
    state: Arc<watch::Sender<AppSettings>>,
}

impl SettingsHandle {
    /// Load settings from the store, falling back to defaults on a
    /// missing or unreadable blob.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let initial = match store.load() {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!(%err, "stored settings unreadable, using defaults");
                AppSettings::default()
            }),
            None => AppSettings::default(),
        };
        let (state, _) = watch::channel(initial);
        Self {
            store,
            state: Arc::new(state),
        }
    }

    /// Current settings snapshot.
    pub fn current(&self) -> AppSettings {
        *self.state.borrow()
    }

    /// Apply a change and persist the result.
    pub fn update(&self, apply: impl FnOnce(&mut AppSettings)) {
        let mut next = self.current();
        apply(&mut next);
        if let Ok(json) = serde_json::to_string(&next) {
            self.store.save(&json);
        }
        self.state.send_replace(next);
    }

    /// Observe settings changes.
    pub fn subscribe(&self) -> watch::Receiver<AppSettings> {
        self.state.subscribe()
    }
}
