//! Mutations: backend writes with a declared invalidation set.
//!
//! A mutation pairs one logical write against the backend with the query
//! keys whose server-side state that write can change. On success, every
//! declared key is invalidated so dependent readers refetch; on failure
//! nothing is touched, so unchanged state is never refetched spuriously.
//!
//! The declared set must be a **superset** of every key that reads state
//! the write can change. Declaring too narrowly is the classic
//! under-invalidation bug: a view bound to an undeclared key keeps showing
//! stale data indefinitely.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::QueryCache;
use crate::error::SyncError;
use crate::key::QueryKey;

type ErasedAction<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R, SyncError>> + Send + Sync>;
type AffectedKeysFn<I> = Arc<dyn Fn(&I) -> Vec<QueryKey> + Send + Sync>;

/// Outcome of one mutation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Success,
    Error,
}

/// A declared write operation: an action plus the keys it invalidates.
///
/// The mutation object itself is reusable and stateless; every
/// [`Mutation::mutate`] call gets its own [`MutationRun`] tracking its own
/// variables and status, so a list view can show a spinner on exactly the
/// row being acted on while other rows run their own invocations.
pub struct Mutation<I, R> {
    cache: QueryCache,
    action: ErasedAction<I, R>,
    affected_keys: AffectedKeysFn<I>,
}

impl<I, R> Mutation<I, R>
where
    I: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Build a mutation from its action and affected-key declaration.
    ///
    /// The action performs exactly one logical write. `affected_keys`
    /// maps the inputs to every query key whose data the write can
    /// change.
    pub fn new<F, Fut, K>(cache: QueryCache, action: F, affected_keys: K) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
        K: Fn(&I) -> Vec<QueryKey> + Send + Sync + 'static,
    {
        Self {
            cache,
            action: Arc::new(move |inputs| action(inputs).boxed()),
            affected_keys: Arc::new(affected_keys),
        }
    }

    /// Start the write. The returned run tracks this invocation; dropping
    /// it does not cancel the write (it completes and invalidates).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mutate(&self, inputs: I) -> MutationRun<I, R> {
        let keys = (self.affected_keys)(&inputs);
        let fut = (self.action)(inputs.clone());
        let cache = self.cache.clone();
        let (status_tx, status_rx) = watch::channel(MutationStatus::Pending);

        let task = tokio::spawn(async move {
            match fut.await {
                Ok(value) => {
                    debug!(affected = keys.len(), "mutation succeeded, invalidating");
                    for key in &keys {
                        cache.invalidate(key);
                    }
                    let _ = status_tx.send(MutationStatus::Success);
                    Ok(value)
                }
                Err(err) => {
                    // A failed write changed nothing; invalidating here
                    // would refetch unchanged state.
                    warn!(%err, "mutation failed, cache untouched");
                    let _ = status_tx.send(MutationStatus::Error);
                    Err(err)
                }
            }
        });

        MutationRun {
            variables: inputs,
            status: status_rx,
            task,
        }
    }

    /// Run the write and await its result. Resolves with the action's
    /// value or rejects with its error; callers own failure handling.
    pub async fn mutate_async(&self, inputs: I) -> Result<R, SyncError> {
        self.mutate(inputs).join().await
    }
}

impl<I, R> Clone for Mutation<I, R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            action: self.action.clone(),
            affected_keys: self.affected_keys.clone(),
        }
    }
}

/// One in-flight (or settled) mutation invocation.
pub struct MutationRun<I, R> {
    variables: I,
    status: watch::Receiver<MutationStatus>,
    task: JoinHandle<Result<R, SyncError>>,
}

impl<I, R> MutationRun<I, R> {
    /// The inputs this invocation was started with.
    pub fn variables(&self) -> &I {
        &self.variables
    }

    pub fn status(&self) -> MutationStatus {
        *self.status.borrow()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status() == MutationStatus::Success
    }

    /// Wait until the invocation settles, without consuming the run.
    pub async fn settled(&mut self) -> MutationStatus {
        loop {
            let current = *self.status.borrow_and_update();
            if current != MutationStatus::Pending {
                return current;
            }
            if self.status.changed().await.is_err() {
                return *self.status.borrow();
            }
        }
    }

    /// Await the action's result.
    pub async fn join(self) -> Result<R, SyncError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(SyncError::Internal(format!(
                "mutation task failed: {join_err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::QueryStatus;
    use crate::query::QueryOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_query(
        cache: &QueryCache,
        key: QueryKey,
        counter: Arc<AtomicUsize>,
    ) -> crate::query::QueryHandle<u64> {
        cache.query(
            key,
            move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) as u64) }
            },
            QueryOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_invalidates_all_affected_keys() {
        let cache = QueryCache::new();
        let contacts_calls = Arc::new(AtomicUsize::new(0));
        let pending_calls = Arc::new(AtomicUsize::new(0));
        let unrelated_calls = Arc::new(AtomicUsize::new(0));

        let contacts_key = QueryKey::new("contacts").param("alice");
        let pending_key = QueryKey::new("pending_requests").param("alice");
        let unrelated_key = QueryKey::new("user_photos").param("alice");

        let contacts = counting_query(&cache, contacts_key.clone(), contacts_calls.clone());
        let pending = counting_query(&cache, pending_key.clone(), pending_calls.clone());
        let unrelated = counting_query(&cache, unrelated_key.clone(), unrelated_calls.clone());
        contacts.fetch().await;
        pending.fetch().await;
        unrelated.fetch().await;

        let accept = Mutation::new(
            cache.clone(),
            |_requester: String| async move { Ok(()) },
            move |_| vec![contacts_key.clone(), pending_key.clone()],
        );
        accept.mutate_async("bob".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(contacts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(pending_calls.load(Ordering::SeqCst), 2);
        assert_eq!(unrelated_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_invalidates_nothing() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("contacts").param("alice");

        let contacts = counting_query(&cache, key.clone(), calls.clone());
        contacts.fetch().await;

        let failing = Mutation::new(
            cache.clone(),
            |_: String| async move {
                Err::<(), _>(SyncError::Backend("rejected".to_string()))
            },
            {
                let key = key.clone();
                move |_| vec![key.clone()]
            },
        );
        let err = failing.mutate_async("bob".to_string()).await.unwrap_err();
        assert_eq!(err, SyncError::Backend("rejected".to_string()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Not even marked stale: the next access still serves cache.
        contacts.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(contacts.snapshot().status, QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_track_their_own_variables() {
        let cache = QueryCache::new();

        let send_request = Mutation::new(
            cache.clone(),
            |target: String| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(target.len())
            },
            |_| Vec::new(),
        );

        let mut run_bob = send_request.mutate("bob".to_string());
        let mut run_carol = send_request.mutate("carol".to_string());

        assert_eq!(run_bob.variables(), "bob");
        assert_eq!(run_carol.variables(), "carol");
        assert!(run_bob.is_pending());
        assert!(run_carol.is_pending());

        assert_eq!(run_bob.settled().await, MutationStatus::Success);
        assert_eq!(run_carol.settled().await, MutationStatus::Success);
        assert!(run_bob.is_success());

        assert_eq!(run_bob.join().await.unwrap(), 3);
        assert_eq!(run_carol.join().await.unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_still_completes_and_invalidates() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("user_photos").param("alice");

        let photos = counting_query(&cache, key.clone(), calls.clone());
        photos.fetch().await;

        let share = Mutation::new(
            cache.clone(),
            |_: String| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            },
            {
                let key = key.clone();
                move |_| vec![key.clone()]
            },
        );
        drop(share.mutate("photo.jpg".to_string()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mutate_async_resolves_with_action_result() {
        let cache = QueryCache::new();
        let double = Mutation::new(
            cache.clone(),
            |n: u32| async move { Ok(n * 2) },
            |_| Vec::new(),
        );
        assert_eq!(double.mutate_async(21).await.unwrap(), 42);
    }
}
