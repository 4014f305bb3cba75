//! # ShareServe Sync
//!
//! A client-side data synchronization layer: a cache of server-derived
//! state keyed by logical queries, with mutation operations that invalidate
//! affected keys so dependent readers refetch.
//!
//! ## Core Concepts
//!
//! - [`QueryKey`] = Identity (which server-derived state this is)
//! - [`QueryHandle`] = A subscriber's read access to one key
//! - [`Mutation`] = A write with a declared set of keys to invalidate
//!
//! The key principle: **cache content changes only through the fetch
//! lifecycle or through invalidation**. Components never write each
//! other's view of the cache directly; after a successful mutation, every
//! declared key is marked stale and live subscribers refetch, so there is
//! a single answer to "why did this data change".
//!
//! ## Guarantees
//!
//! - **One fetch per key**: concurrent subscribers of the same key share a
//!   single in-flight request and observe the same resolved value
//! - **Invalidate only on success**: a failed mutation leaves every key
//!   untouched
//! - **Stale-while-error**: a failed refetch keeps the last-known data
//! - **Typed errors**: rejections surface as [`SyncError`] values in query
//!   state or mutation results, never as panics across an await
//!
//! ## Example
//!
//! ```ignore
//! use shareserve_sync::{Mutation, QueryCache, QueryKey, QueryOptions};
//!
//! let cache = QueryCache::new();
//!
//! let contacts = cache.query(
//!     QueryKey::new("contacts").param("alice"),
//!     move || {
//!         let backend = backend.clone();
//!         async move { backend.get_contacts("alice").await }
//!     },
//!     QueryOptions::default(),
//! );
//! let state = contacts.fetch().await;
//!
//! let send_request = Mutation::new(
//!     cache.clone(),
//!     move |input: RequestInput| {
//!         let backend = backend.clone();
//!         async move { backend.send_contact_request(&input.sender, &input.target).await }
//!     },
//!     |input| vec![QueryKey::new("contacts").param(input.sender.clone())],
//! );
//! send_request.mutate_async(input).await?;
//! // `contacts` is now stale and, being subscribed, refetching.
//! ```
//!
//! ## What This Is Not
//!
//! This crate is **not** a backend client, a persistence layer, or a UI
//! state store. Fetchers and mutation actions are opaque async closures
//! owned by the caller; the layer only coordinates caching, deduplication,
//! staleness, and invalidation around them.

mod cache;
mod entry;
mod error;
mod key;
mod mutation;
mod query;

pub use cache::{CacheConfig, QueryCache};
pub use entry::QueryStatus;
pub use error::{Result, SyncError};
pub use key::{QueryKey, QueryParam};
pub use mutation::{Mutation, MutationRun, MutationStatus};
pub use query::{QueryHandle, QueryOptions, QueryState};
