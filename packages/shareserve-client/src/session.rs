//! The in-process auth session.
//!
//! Holds the signed-in username and lets views observe sign-in state.
//! Authentication itself goes through [`crate::ShareServe::login`]; on
//! success the embedder stores the resolved username here. Persisting the
//! session across launches is the embedder's concern.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Shared handle to the signed-in identity.
#[derive(Clone)]
pub struct AuthSession {
    state: Arc<watch::Sender<Option<String>>>,
}

impl AuthSession {
    /// Start signed out.
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Record a successful sign-in.
    pub fn login(&self, username: impl Into<String>) {
        let username = username.into();
        debug!(%username, "session started");
        self.state.send_replace(Some(username));
    }

    /// Clear the session.
    pub fn logout(&self) {
        debug!("session ended");
        self.state.send_replace(None);
    }

    /// The signed-in username, if any.
    pub fn current(&self) -> Option<String> {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Observe sign-in state changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.state.subscribe()
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
