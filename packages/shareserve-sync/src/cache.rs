//! The shared query cache.
//!
//! `QueryCache` is an explicit, injectable service: application code
//! constructs one at startup and passes clones wherever queries or
//! mutations are built, and tests instantiate isolated instances. There is
//! no hidden global.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::entry::{AnyData, Entry, ErasedFetcher, QueryStatus};
use crate::error::SyncError;
use crate::key::QueryKey;
use crate::query::{QueryHandle, QueryOptions};

/// Attempts per fetch when the query opted into retries.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Pause between failed attempts of one fetch.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which a successful entry stops being served from cache
    /// and the next access refetches. `None` means successes stay fresh
    /// until invalidated.
    pub stale_after: Option<Duration>,

    /// How long an entry may sit with zero subscribers before
    /// [`QueryCache::sweep`] drops it.
    pub gc_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: None,
            gc_window: Duration::from_secs(300),
        }
    }
}

struct CacheShared {
    entries: DashMap<QueryKey, Arc<Entry>>,
    config: CacheConfig,
}

/// Process-wide cache of server-derived state, keyed by [`QueryKey`].
///
/// Cloning is cheap and every clone reads and writes the same entries;
/// that sharing is what lets two independent components subscribed to the
/// same key see one fetch and one result.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<CacheShared>,
}

impl QueryCache {
    /// Create a cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with explicit configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                entries: DashMap::new(),
                config,
            }),
        }
    }

    /// Subscribe to a key with a fetcher producing its value.
    ///
    /// The fetcher must be idempotent from the caller's perspective: it
    /// may run on demand, on invalidation, and on every poll tick. The
    /// returned handle shares the key's cache entry with every other
    /// subscriber; dropping it ends this subscription (and its polling).
    pub fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> QueryHandle<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let erased: ErasedFetcher = Arc::new(move || {
            let fut = fetcher();
            async move { fut.await.map(|value| Arc::new(value) as AnyData) }.boxed()
        });
        QueryHandle::register(self.clone(), key, erased, options)
    }

    /// Mark every key under the given key stale. Matching is by prefix:
    /// a fully parameterized key invalidates exactly itself, while a bare
    /// resource key invalidates every parameterization of that resource.
    ///
    /// A stale key with live subscribers and a registered fetcher
    /// refetches immediately; otherwise the next access refetches. This
    /// is the only sanctioned way (besides the fetch lifecycle itself)
    /// for cache content to change.
    pub fn invalidate(&self, key: &QueryKey) {
        let targets: Vec<(QueryKey, Arc<Entry>)> = self
            .shared
            .entries
            .iter()
            .filter(|e| key.is_prefix_of(e.key()))
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        for (target, entry) in targets {
            self.invalidate_entry(&target, entry);
        }
    }

    fn invalidate_entry(&self, key: &QueryKey, entry: Arc<Entry>) {
        let refetch = {
            let mut inner = entry.lock();
            inner.stale = true;
            inner.epoch = inner.epoch.wrapping_add(1);
            let mounted = inner.subscribers > 0 && inner.inflight.is_none();
            if mounted {
                inner.fetcher.clone().map(|f| (f, inner.retry))
            } else {
                None
            }
        };
        entry.bump_version();
        debug!(key = %key, active_refetch = refetch.is_some(), "invalidated");

        if let Some((fetcher, retry)) = refetch {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let cache = self.clone();
                    let key = key.clone();
                    runtime.spawn(async move {
                        let _ = cache.fetch_erased(&key, &fetcher, false, retry).await;
                    });
                }
                Err(_) => {
                    warn!(key = %key, "no runtime available, refetch deferred to next access");
                }
            }
        }
    }

    /// Read a key's cached value without subscribing or fetching.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entry = self.entry_if_exists(key)?;
        let inner = entry.lock();
        inner.data.clone().and_then(|data| data.downcast::<T>().ok())
    }

    /// Drop entries that have had zero subscribers for longer than the
    /// configured GC window. Returns how many were removed. Cadence is the
    /// embedder's choice; the cache never sweeps on its own.
    pub fn sweep(&self) -> usize {
        let window = self.shared.config.gc_window;
        let before = self.shared.entries.len();
        self.shared.entries.retain(|key, entry| {
            let inner = entry.lock();
            let keep = inner.subscribers > 0
                || inner.inflight.is_some()
                || inner.idle_since.is_none_or(|t| t.elapsed() < window);
            if !keep {
                debug!(key = %key, "sweeping idle entry");
            }
            keep
        });
        before - self.shared.entries.len()
    }

    /// Number of live cache entries.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    pub(crate) fn entry(&self, key: &QueryKey) -> Arc<Entry> {
        self.shared
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }

    pub(crate) fn entry_if_exists(&self, key: &QueryKey) -> Option<Arc<Entry>> {
        self.shared.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Core fetch path: serve fresh cache, join an in-flight fetch, or
    /// start a new one. At most one fetch is ever in flight per key.
    pub(crate) async fn fetch_erased(
        &self,
        key: &QueryKey,
        fetcher: &ErasedFetcher,
        force: bool,
        retry: bool,
    ) -> Result<AnyData, SyncError> {
        let entry = self.entry(key);

        let (shared, started) = {
            let mut inner = entry.lock();

            if !force && inner.status == QueryStatus::Success && !inner.stale {
                let within_window = match (self.shared.config.stale_after, inner.fetched_at) {
                    (Some(window), Some(at)) => at.elapsed() < window,
                    _ => true,
                };
                if within_window {
                    if let Some(data) = inner.data.clone() {
                        return Ok(data);
                    }
                }
            }

            if let Some(inflight) = inner.inflight.clone() {
                debug!(key = %key, "joining in-flight fetch");
                (inflight, false)
            } else {
                debug!(key = %key, retry, "starting fetch");
                let shared = run_fetch(entry.clone(), key.clone(), fetcher.clone(), retry, inner.epoch)
                    .boxed()
                    .shared();
                inner.status = QueryStatus::Loading;
                inner.inflight = Some(shared.clone());
                (shared, true)
            }
        };

        if started {
            entry.bump_version();
        }
        shared.await
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Run one fetch (with per-query retry policy) and write the outcome back
/// into the entry. The future is shared by every subscriber that joined
/// the fetch, so the write-back runs exactly once.
async fn run_fetch(
    entry: Arc<Entry>,
    key: QueryKey,
    fetcher: ErasedFetcher,
    retry: bool,
    epoch_at_start: u64,
) -> Result<AnyData, SyncError> {
    let attempts = if retry { MAX_FETCH_ATTEMPTS } else { 1 };
    let mut outcome = Err(SyncError::Internal("fetch ran zero attempts".to_string()));
    for attempt in 1..=attempts {
        outcome = fetcher().await;
        match &outcome {
            Ok(_) => break,
            Err(err) => {
                warn!(key = %key, %err, attempt, "fetch attempt failed");
                if attempt < attempts {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }

    {
        let mut inner = entry.lock();
        inner.inflight = None;
        match &outcome {
            Ok(data) => {
                inner.data = Some(data.clone());
                inner.status = QueryStatus::Success;
                inner.error = None;
                inner.fetched_at = Some(Instant::now());
                // An invalidation that arrived mid-flight keeps the entry
                // stale; this result may predate the write it signaled.
                if inner.epoch == epoch_at_start {
                    inner.stale = false;
                }
            }
            Err(err) => {
                inner.status = QueryStatus::Error;
                inner.error = Some(err.clone());
                // Last-known data is retained: stale-while-error.
            }
        }
    }
    entry.bump_version();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetcher(
        counter: Arc<AtomicUsize>,
        value: i32,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<i32, SyncError>> + Send + Sync + 'static
    {
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("all_users");

        let first = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 7),
            QueryOptions::default(),
        );
        let second = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 7),
            QueryOptions::default(),
        );

        let (a, b) = tokio::join!(first.fetch(), second.fetch());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.status, QueryStatus::Success);
        assert_eq!(b.status, QueryStatus::Success);
        // Both observe the very same shared value.
        let (da, db) = (a.data.unwrap(), b.data.unwrap());
        assert!(Arc::ptr_eq(&da, &db));
        assert_eq!(*da, 7);
    }

    #[tokio::test]
    async fn test_fresh_cache_served_without_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("contacts").param("alice");

        let handle = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 1),
            QueryOptions::default(),
        );
        handle.fetch().await;
        handle.fetch().await;
        handle.fetch().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_after_window_triggers_refetch() {
        let cache = QueryCache::with_config(CacheConfig {
            stale_after: Some(Duration::from_secs(30)),
            ..CacheConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = cache.query::<i32, _, _>(
            QueryKey::new("feed"),
            counting_fetcher(calls.clone(), 1),
            QueryOptions::default(),
        );
        handle.fetch().await;
        handle.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_refetches_mounted_key_only() {
        let cache = QueryCache::new();
        let mounted_calls = Arc::new(AtomicUsize::new(0));
        let unrelated_calls = Arc::new(AtomicUsize::new(0));
        let mounted_key = QueryKey::new("contacts").param("alice");
        let unrelated_key = QueryKey::new("user_videos").param("alice");

        let mounted = cache.query::<i32, _, _>(
            mounted_key.clone(),
            counting_fetcher(mounted_calls.clone(), 1),
            QueryOptions::default(),
        );
        let unrelated = cache.query::<i32, _, _>(
            unrelated_key.clone(),
            counting_fetcher(unrelated_calls.clone(), 2),
            QueryOptions::default(),
        );
        mounted.fetch().await;
        unrelated.fetch().await;

        cache.invalidate(&mounted_key);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(mounted_calls.load(Ordering::SeqCst), 2);
        assert_eq!(unrelated_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_unmounted_key_marks_stale_for_next_access() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("contacts").param("bob");

        let handle = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 1),
            QueryOptions::default(),
        );
        handle.fetch().await;
        drop(handle);

        cache.invalidate(&key);
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Nobody mounted: no active refetch happened.
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The next subscriber access refetches.
        let handle = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 1),
            QueryOptions::default(),
        );
        handle.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_last_known_data() {
        let cache = QueryCache::new();
        let fail = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("profile").param("alice");

        let fail_flag = fail.clone();
        let handle = cache.query::<i32, _, _>(
            key.clone(),
            move || {
                let fail_flag = fail_flag.clone();
                async move {
                    if fail_flag.load(Ordering::SeqCst) > 0 {
                        Err(SyncError::Backend("unreachable".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            QueryOptions::default().retry(false),
        );

        let ok = handle.fetch().await;
        assert_eq!(ok.status, QueryStatus::Success);

        fail.store(1, Ordering::SeqCst);
        let err = handle.refetch().await;
        assert_eq!(err.status, QueryStatus::Error);
        assert_eq!(err.error, Some(SyncError::Backend("unreachable".to_string())));
        // Stale-while-error: the old value is still there.
        assert_eq!(*err.data.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_peek_reads_without_fetching() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("all_users");

        assert!(cache.peek::<i32>(&key).is_none());

        let handle = cache.query::<i32, _, _>(
            key.clone(),
            counting_fetcher(calls.clone(), 9),
            QueryOptions::default(),
        );
        handle.fetch().await;

        assert_eq!(cache.peek::<i32>(&key).as_deref(), Some(&9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_only_long_idle_entries() {
        let cache = QueryCache::with_config(CacheConfig {
            gc_window: Duration::from_secs(60),
            ..CacheConfig::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let kept = cache.query::<i32, _, _>(
            QueryKey::new("kept"),
            counting_fetcher(calls.clone(), 1),
            QueryOptions::default(),
        );
        kept.fetch().await;

        {
            let dropped = cache.query::<i32, _, _>(
                QueryKey::new("dropped"),
                counting_fetcher(calls.clone(), 2),
                QueryOptions::default(),
            );
            dropped.fetch().await;
        }

        assert_eq!(cache.sweep(), 0);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.peek::<i32>(&QueryKey::new("kept")).is_some());
    }

    #[tokio::test]
    async fn test_bare_resource_key_invalidates_every_parameterization() {
        let cache = QueryCache::new();
        let alice_calls = Arc::new(AtomicUsize::new(0));
        let bob_calls = Arc::new(AtomicUsize::new(0));

        let alice = cache.query::<i32, _, _>(
            QueryKey::new("contacts").param("alice"),
            counting_fetcher(alice_calls.clone(), 1),
            QueryOptions::default(),
        );
        let bob = cache.query::<i32, _, _>(
            QueryKey::new("contacts").param("bob"),
            counting_fetcher(bob_calls.clone(), 2),
            QueryOptions::default(),
        );
        alice.fetch().await;
        bob.fetch().await;

        cache.invalidate(&QueryKey::new("contacts"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(alice_calls.load(Ordering::SeqCst), 2);
        assert_eq!(bob_calls.load(Ordering::SeqCst), 2);
    }
}
