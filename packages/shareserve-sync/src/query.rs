//! Query handles: one subscriber's read access to a cached key.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::QueryCache;
use crate::entry::{ErasedFetcher, QueryStatus};
use crate::error::SyncError;
use crate::key::QueryKey;

/// Per-subscription options.
///
/// `enabled = false` is the guard pattern for progressively-available
/// parameters (an authenticated identity that populates after startup):
/// the query simply does not execute, which is not an error.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Execute fetches at all. Disabled queries serve whatever the shared
    /// entry already holds and never run their fetcher.
    pub enabled: bool,

    /// Retry failed fetches (up to the layer's attempt cap) before
    /// reporting an error. Auth-flavored operations set this to `false`
    /// so a failure is terminal until deliberately re-invoked.
    pub retry: bool,

    /// Poll cadence. Each tick waits for the previous fetch to resolve;
    /// ticks never overlap on one key. Polling stops when the handle
    /// drops.
    pub refetch_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: true,
            refetch_interval: None,
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

/// A point-in-time view of a query's cache entry.
pub struct QueryState<T> {
    /// Last successfully fetched value, if any. Retained across failed
    /// refetches.
    pub data: Option<Arc<T>>,
    pub status: QueryStatus,
    pub error: Option<SyncError>,
}

impl<T> QueryState<T> {
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryState")
            .field("data", &self.data)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish()
    }
}

/// A live subscription to one [`QueryKey`].
///
/// Handles share cache entries: every handle for a key reads the same
/// data, joins the same in-flight fetch, and wakes on the same
/// invalidations. Dropping the handle ends the subscription, stops its
/// polling task, and lets the entry age toward garbage collection once no
/// subscriber remains.
pub struct QueryHandle<T> {
    cache: QueryCache,
    key: QueryKey,
    options: QueryOptions,
    fetcher: ErasedFetcher,
    version_rx: watch::Receiver<u64>,
    poll_task: Option<JoinHandle<()>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
    pub(crate) fn register(
        cache: QueryCache,
        key: QueryKey,
        fetcher: ErasedFetcher,
        options: QueryOptions,
    ) -> Self {
        let entry = cache.entry(&key);
        {
            let mut inner = entry.lock();
            inner.subscribers += 1;
            inner.idle_since = None;
            if options.enabled {
                // Invalidation uses the most recent enabled subscriber's
                // fetcher to actively refresh a mounted key.
                inner.fetcher = Some(fetcher.clone());
                inner.retry = options.retry;
            }
        }
        let version_rx = entry.subscribe_version();

        let poll_task = match (options.enabled, options.refetch_interval) {
            (true, Some(period)) => {
                Some(spawn_poll(cache.clone(), key.clone(), fetcher.clone(), options.retry, period))
            }
            _ => None,
        };

        Self {
            cache,
            key,
            options,
            fetcher,
            version_rx,
            poll_task,
            _marker: PhantomData,
        }
    }

    /// The key this handle subscribes to.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Current entry state without fetching.
    pub fn snapshot(&self) -> QueryState<T> {
        let entry = self.cache.entry(&self.key);
        let inner = entry.lock();
        QueryState {
            data: inner.data.clone().and_then(|data| data.downcast::<T>().ok()),
            status: inner.status,
            error: inner.error.clone(),
        }
    }

    /// Ensure the entry is populated: serve fresh cache, join an
    /// in-flight fetch, or run the fetcher. Disabled queries skip straight
    /// to the snapshot. Fetch failures land in the returned state, never
    /// as a panic or rejection.
    pub async fn fetch(&self) -> QueryState<T> {
        if !self.options.enabled {
            debug!(key = %self.key, "query disabled, not fetching");
            return self.snapshot();
        }
        let _ = self
            .cache
            .fetch_erased(&self.key, &self.fetcher, false, self.options.retry)
            .await;
        self.snapshot()
    }

    /// Fetch even if the cached value is fresh. Still joins an already
    /// in-flight fetch rather than stacking a second one.
    pub async fn refetch(&self) -> QueryState<T> {
        if !self.options.enabled {
            return self.snapshot();
        }
        let _ = self
            .cache
            .fetch_erased(&self.key, &self.fetcher, true, self.options.retry)
            .await;
        self.snapshot()
    }

    /// Wait until the entry changes (fetch completion or invalidation),
    /// then return the new snapshot.
    pub async fn updated(&mut self) -> QueryState<T> {
        let _ = self.version_rx.changed().await;
        self.snapshot()
    }
}

fn spawn_poll(
    cache: QueryCache,
    key: QueryKey,
    fetcher: ErasedFetcher,
    retry: bool,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(key = %key, ?period, "polling started");
        loop {
            let started = Instant::now();
            let _ = cache.fetch_erased(&key, &fetcher, true, retry).await;
            tokio::time::sleep_until(started + period).await;
        }
    })
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(entry) = self.cache.entry_if_exists(&self.key) {
            let mut inner = entry.lock();
            inner.subscribers = inner.subscribers.saturating_sub(1);
            if inner.subscribers == 0 {
                inner.idle_since = Some(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instant_fetcher(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<u64, SyncError>> + Send + Sync + 'static
    {
        move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) as u64) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_disabled_query_never_runs_fetcher() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = cache.query::<u64, _, _>(
            QueryKey::new("user_profile").param("missing"),
            instant_fetcher(calls.clone()),
            QueryOptions::default().enabled(false),
        );

        let state = handle.fetch().await;
        assert_eq!(state.status, QueryStatus::Idle);
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_enabled_runs_multiple_attempts() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let attempts = calls.clone();
        let handle = cache.query::<u64, _, _>(
            QueryKey::new("flaky"),
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err::<u64, _>(SyncError::Backend("down".to_string())) }
            },
            QueryOptions::default(),
        );

        let state = handle.fetch().await;
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_disabled_is_single_attempt() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let attempts = calls.clone();
        let handle = cache.query::<u64, _, _>(
            QueryKey::new("login_probe"),
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err::<u64, _>(SyncError::Backend("denied".to_string())) }
            },
            QueryOptions::default().retry(false),
        );

        let state = handle.fetch().await;
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Terminal until deliberately re-invoked; a new fetch re-attempts.
        handle.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let attempts = calls.clone();
        let handle = cache.query::<u64, _, _>(
            QueryKey::new("transient"),
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(SyncError::Backend("blip".to_string()))
                    } else {
                        Ok(99)
                    }
                }
            },
            QueryOptions::default(),
        );

        let state = handle.fetch().await;
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(*state.data.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fetches_on_cadence_without_overlap() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = cache.query::<u64, _, _>(
            QueryKey::new("conversation").param("alice").param("bob"),
            instant_fetcher(calls.clone()),
            QueryOptions::default().refetch_interval(Duration::from_secs(3)),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        // Instant fetches land at t = 0, 3, 6, 9.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_defers_next_poll_tick() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let handle = cache.query::<u64, _, _>(
            QueryKey::new("slow_feed"),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(0)
                }
            },
            QueryOptions::default().refetch_interval(Duration::from_secs(3)),
        );

        // Fetches start at t = 0 and t = 5 (the tick waits out the slow
        // fetch); nothing overlaps.
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_handle_drops() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = cache.query::<u64, _, _>(
            QueryKey::new("short_lived"),
            instant_fetcher(calls.clone()),
            QueryOptions::default().refetch_interval(Duration::from_secs(3)),
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        let seen = calls.load(Ordering::SeqCst);
        assert!(seen >= 2);
        drop(handle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updated_wakes_on_invalidation_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("contacts").param("alice");

        let mut handle = cache.query::<u64, _, _>(
            key.clone(),
            instant_fetcher(calls.clone()),
            QueryOptions::default(),
        );
        let first = handle.fetch().await;
        assert_eq!(*first.data.unwrap(), 0);

        cache.invalidate(&key);
        // First wake is the invalidation itself; keep waiting until the
        // refetched value lands.
        let mut latest = handle.updated().await;
        while latest.data.as_deref() == Some(&0) || !latest.is_success() {
            latest = handle.updated().await;
        }
        assert_eq!(*latest.data.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_handles_share_cached_value_across_components() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("all_users");

        let list_view = cache.query::<u64, _, _>(
            key.clone(),
            instant_fetcher(calls.clone()),
            QueryOptions::default(),
        );
        list_view.fetch().await;

        // A second component subscribing later sees the cached value
        // without a second fetch.
        let suggestions = cache.query::<u64, _, _>(
            key.clone(),
            instant_fetcher(calls.clone()),
            QueryOptions::default(),
        );
        let state = suggestions.fetch().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*state.data.unwrap(), 0);
    }
}
