//! Typed write operations and their invalidation sets.
//!
//! Every mutation declares the query keys whose server-side state the
//! write can change: the full set, not just the view that triggered the
//! write. A contact acceptance changes *both* users' contact lists; a
//! message lands in *both* direction-ordered conversation keys; a profile
//! edit changes every list that re-reads profile fields. Declaring less
//! leaves some mounted view showing stale data until it happens to
//! refetch for another reason.

use std::sync::Arc;

use shareserve_sync::{Mutation, QueryKey};

use crate::keys;
use crate::queries::ShareServe;
use crate::types::MediaItem;

/// Inputs for [`ShareServe::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub bio: String,
}

/// Inputs for [`ShareServe::login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Inputs for [`ShareServe::update_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProfileInput {
    pub username: String,
    pub display_name: String,
    pub bio: String,
}

/// Inputs for [`ShareServe::send_contact_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRequestInput {
    pub sender: String,
    pub target: String,
}

/// Inputs for [`ShareServe::accept_contact_request`] and
/// [`ShareServe::decline_contact_request`]: the acting user and the user
/// who sent the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDecisionInput {
    pub username: String,
    pub requester: String,
}

/// Inputs for [`ShareServe::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageInput {
    pub sender: String,
    pub receiver: String,
    pub text: String,
}

/// Inputs for [`ShareServe::share_photo`] and [`ShareServe::share_video`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareMediaInput {
    pub username: String,
    pub item: MediaItem,
}

impl ShareServe {
    /// Create an account. Nothing is cached about a user that did not
    /// exist, except the directory listings.
    pub fn register(&self) -> Mutation<RegisterInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: RegisterInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .register_user(
                            &input.username,
                            &input.password,
                            &input.display_name,
                            &input.bio,
                        )
                        .await
                        .map_err(Into::into)
                }
            },
            |_| vec![keys::all_users(), keys::find_users_any()],
        )
    }

    /// Authenticate; resolves with the username for the session layer.
    /// Never retried by the layer; a failed login stays failed until the
    /// user acts again.
    pub fn login(&self) -> Mutation<LoginInput, String> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: LoginInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .login_user(&input.username, &input.password)
                        .await
                        .map_err(shareserve_sync::SyncError::from)?;
                    Ok(input.username)
                }
            },
            |_| Vec::new(),
        )
    }

    /// Edit display name and bio. Invalidates the profile itself plus
    /// every list that re-reads profile fields: the directory and all
    /// cached searches.
    pub fn update_profile(&self) -> Mutation<UpdateProfileInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: UpdateProfileInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .update_user_profile(&input.username, &input.display_name, &input.bio)
                        .await
                        .map_err(Into::into)
                }
            },
            |input| {
                vec![
                    keys::user_profile(&input.username),
                    keys::all_users(),
                    keys::find_users_any(),
                ]
            },
        )
    }

    /// Ask another user for contact. The target's pending list gains an
    /// entry; the sender's contact view may surface an outgoing state.
    pub fn send_contact_request(&self) -> Mutation<ContactRequestInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: ContactRequestInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .send_contact_request(&input.sender, &input.target)
                        .await
                        .map_err(Into::into)
                }
            },
            |input| {
                vec![
                    keys::contacts(&input.sender),
                    keys::pending_requests(&input.target),
                ]
            },
        )
    }

    /// Accept a pending request. Both users' contact lists change, and
    /// the request leaves the accepter's pending list.
    pub fn accept_contact_request(&self) -> Mutation<ContactDecisionInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: ContactDecisionInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .accept_contact_request(&input.username, &input.requester)
                        .await
                        .map_err(Into::into)
                }
            },
            |input| {
                vec![
                    keys::contacts(&input.username),
                    keys::pending_requests(&input.username),
                    keys::contacts(&input.requester),
                ]
            },
        )
    }

    /// Decline a pending request. Only the decliner's pending list
    /// changes.
    pub fn decline_contact_request(&self) -> Mutation<ContactDecisionInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: ContactDecisionInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .decline_contact_request(&input.username, &input.requester)
                        .await
                        .map_err(Into::into)
                }
            },
            |input| vec![keys::pending_requests(&input.username)],
        )
    }

    /// Send a chat message. The conversation exists under two
    /// direction-ordered keys; both readers see the new message.
    pub fn send_message(&self) -> Mutation<SendMessageInput, ()> {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: SendMessageInput| {
                let backend = Arc::clone(&backend);
                async move {
                    backend
                        .send_message(&input.sender, &input.receiver, &input.text)
                        .await
                        .map_err(Into::into)
                }
            },
            |input| {
                vec![
                    keys::conversation(&input.sender, &input.receiver),
                    keys::conversation(&input.receiver, &input.sender),
                ]
            },
        )
    }

    /// Share a photo to the user's gallery (uploads and saved generator
    /// output alike).
    pub fn share_photo(&self) -> Mutation<ShareMediaInput, ()> {
        self.share_media(keys::USER_PHOTOS, |backend, input| async move {
            backend.share_photo(&input.username, input.item).await
        })
    }

    /// Share a video to the user's gallery.
    pub fn share_video(&self) -> Mutation<ShareMediaInput, ()> {
        self.share_media(keys::USER_VIDEOS, |backend, input| async move {
            backend.share_video(&input.username, input.item).await
        })
    }

    fn share_media<F, Fut>(&self, resource: &'static str, op: F) -> Mutation<ShareMediaInput, ()>
    where
        F: Fn(Arc<dyn crate::backend::BackendClient>, ShareMediaInput) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = crate::backend::Result<()>> + Send + 'static,
    {
        let backend = self.backend();
        Mutation::new(
            self.cache().clone(),
            move |input: ShareMediaInput| {
                let fut = op(Arc::clone(&backend), input);
                async move { fut.await.map_err(Into::into) }
            },
            move |input| vec![QueryKey::new(resource).param(&input.username)],
        )
    }
}
