//! # ShareServe Client
//!
//! The domain layer of the ShareServe client: profiles, contacts,
//! messaging, and media sharing, expressed as typed queries and mutations
//! over the [`shareserve_sync`] cache.
//!
//! The backend is an abstract collaborator behind the [`BackendClient`]
//! trait; this crate decides *what* to fetch and *which keys a write
//! invalidates*, never how bytes move. The [`ShareServe`] facade mirrors
//! the app's data needs one method per logical view:
//!
//! ```ignore
//! use std::sync::Arc;
//! use shareserve_client::{SendMessageInput, ShareServe};
//!
//! let app = ShareServe::new(backend);
//!
//! // Reads: cached, deduplicated, shared between views.
//! let contacts = app.contacts(Some("alice"));
//! let state = contacts.fetch().await;
//!
//! // Chat polls its conversation while mounted.
//! let chat = app.conversation(Some("alice"), Some("bob"));
//!
//! // Writes: invalidate every reader of the changed state.
//! app.send_message().mutate_async(SendMessageInput {
//!     sender: "alice".into(),
//!     receiver: "bob".into(),
//!     text: "hey!".into(),
//! }).await?;
//! ```
//!
//! Invalidation sets here are deliberately wider than "the view that
//! triggered the write": a write invalidates every key whose reads it can
//! change, on both sides of a relationship. See the module docs in
//! [`mutations`] for the per-operation sets.

pub mod backend;
pub mod keys;
pub mod mutations;
pub mod notifications;
pub mod queries;
pub mod session;
pub mod settings;
pub mod types;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


pub use backend::{BackendClient, BackendError};
pub use mutations::{
    ContactDecisionInput, ContactRequestInput, LoginInput, RegisterInput, SendMessageInput,
    ShareMediaInput, UpdateProfileInput,
};
pub use notifications::NotificationCounts;
pub use queries::{ShareServe, CONVERSATION_POLL_INTERVAL};
pub use session::AuthSession;
pub use settings::{AppSettings, InMemorySettingsStore, SettingsHandle, SettingsStore};
pub use types::{ChatMessage, MediaItem, UserProfile};

// Re-export the sync layer types that appear in this crate's API.
pub use shareserve_sync::{
    Mutation, MutationRun, MutationStatus, QueryCache, QueryHandle, QueryKey, QueryState,
    QueryStatus, SyncError,
};
