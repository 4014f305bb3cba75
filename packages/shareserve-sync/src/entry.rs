//! Cache entries: the per-key record behind every query.
//!
//! Entries hold type-erased payloads (`Arc<dyn Any>`) so one map can serve
//! queries of any result type; typed access happens at the
//! [`crate::QueryHandle`] boundary via downcast. Entries are created on
//! first subscription, mutated only by the fetch lifecycle and by explicit
//! invalidation, and become sweepable once their last subscriber drops.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::SyncError;

/// Type-erased query payload shared between subscribers.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// Type-erased fetcher, registered by the most recent enabled subscriber
/// so invalidation can actively refetch a mounted key.
pub(crate) type ErasedFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData, SyncError>> + Send + Sync>;

/// A deduplicated in-flight fetch, awaited by every concurrent subscriber.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<AnyData, SyncError>>>;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    /// A fetch is in flight and no earlier success is being served.
    Loading,
    /// The entry holds data from a successful fetch.
    Success,
    /// The most recent fetch failed. Earlier data, if any, is retained.
    Error,
}

pub(crate) struct EntryInner {
    pub status: QueryStatus,
    pub data: Option<AnyData>,
    pub error: Option<SyncError>,
    pub fetched_at: Option<Instant>,
    /// Set by invalidation; cleared when a fetch started after the
    /// invalidation completes.
    pub stale: bool,
    /// Bumped on every invalidation so an in-flight fetch that straddles
    /// one cannot clear the stale flag.
    pub epoch: u64,
    pub inflight: Option<SharedFetch>,
    pub fetcher: Option<ErasedFetcher>,
    pub retry: bool,
    pub subscribers: usize,
    pub idle_since: Option<Instant>,
}

pub(crate) struct Entry {
    inner: Mutex<EntryInner>,
    version: watch::Sender<u64>,
}

impl Entry {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Mutex::new(EntryInner {
                status: QueryStatus::Idle,
                data: None,
                error: None,
                fetched_at: None,
                stale: false,
                epoch: 0,
                inflight: None,
                fetcher: None,
                retry: true,
                subscribers: 0,
                idle_since: Some(Instant::now()),
            }),
            version,
        }
    }

    /// Lock the entry record. Never held across an await.
    pub fn lock(&self) -> MutexGuard<'_, EntryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notify subscribers that the entry changed.
    pub fn bump_version(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// A receiver that wakes on every [`Entry::bump_version`].
    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}
