//! The request-scoped cache.
//!
//! One [`RequestCache`] exists per key-space per request. It maps each key to its entry: a
//! pending load every concurrent requester attaches to, or the final outcome of that load.
//! Entries are never evicted and never overwritten once final, so the cache is bounded by the
//! number of distinct keys one request touches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Weak;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batching::KeyType;
use crate::batching::ValueType;
use crate::context::RequestStats;
use crate::error::FetchError;
use crate::model::KeySpace;

/// The outcome every waiter of a key receives: a value, `None` when the backend does not know
/// the key, or the error of the round trip that was supposed to answer it.
pub type Outcome<V> = Result<Option<Arc<V>>, FetchError>;

/// A deferred [`Outcome`], handed back to the field resolver.
pub type LoadFuture<V> = BoxFuture<'static, Outcome<V>>;

type SharedLoad<V> = Shared<LoadFuture<V>>;

enum Entry<V> {
    Pending(SharedLoad<V>),
    Resolved(Option<Arc<V>>),
    Failed(FetchError),
}

/// Observable state of an entry.
#[cfg(test)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryState {
    Pending,
    Resolved,
    Failed,
}

pub(crate) struct RequestCache<K, V> {
    key_space: KeySpace,
    entries: Arc<Mutex<HashMap<K, Entry<V>>>>,
    cancel: CancellationToken,
    stats: Arc<RequestStats>,
}

impl<K, V> RequestCache<K, V>
where
    K: KeyType,
    V: ValueType,
{
    pub(crate) fn new(
        key_space: KeySpace,
        cancel: CancellationToken,
        stats: Arc<RequestStats>,
    ) -> Self {
        Self {
            key_space,
            entries: Default::default(),
            cancel,
            stats,
        }
    }

    /// Get the outcome for `key`, calling `loader` on the first request for it.
    ///
    /// `loader` is called at most once per key for the lifetime of the cache, while the entry
    /// lock is held: it must only build or register the load, not wait for it. Whatever it
    /// returns is shared by every caller attaching to the key until it completes, and its
    /// outcome, including errors, is then served to every later caller.
    pub(crate) fn get_or_load<F, Fut>(&self, key: K, loader: F) -> LoadFuture<V>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Outcome<V>> + Send + 'static,
    {
        self.stats.key_requested();
        let mut entries = self.entries.lock();
        let shared = match entries.get(&key) {
            Some(Entry::Resolved(value)) => {
                self.stats.cache_hit();
                tracing::trace!(key_space = %self.key_space, ?key, "cache hit");
                return futures::future::ready(Ok(value.clone())).boxed();
            }
            Some(Entry::Failed(error)) => {
                self.stats.cache_hit();
                tracing::trace!(key_space = %self.key_space, ?key, "cache hit on failed entry");
                return futures::future::ready(Err(error.clone())).boxed();
            }
            Some(Entry::Pending(shared)) => {
                self.stats.cache_hit();
                tracing::trace!(key_space = %self.key_space, ?key, "attaching to pending load");
                shared.clone()
            }
            None => {
                let load = loader(key.clone());
                let cancel = self.cancel.clone();
                let key_space = self.key_space;
                let shared = async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(FetchError::Cancelled { key_space }),
                        outcome = load => outcome,
                    }
                }
                .boxed()
                .shared();
                entries.insert(key.clone(), Entry::Pending(shared.clone()));
                shared
            }
        };
        drop(entries);

        settle(Arc::downgrade(&self.entries), key, shared)
    }

    #[cfg(test)]
    pub(crate) fn state(&self, key: &K) -> Option<EntryState> {
        self.entries.lock().get(key).map(|entry| match entry {
            Entry::Pending(_) => EntryState::Pending,
            Entry::Resolved(_) => EntryState::Resolved,
            Entry::Failed(_) => EntryState::Failed,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Wait for a pending load and record its outcome as final.
///
/// The cache is only weakly referenced: a waiter must not keep a torn down request's cache alive.
fn settle<K, V>(
    entries: Weak<Mutex<HashMap<K, Entry<V>>>>,
    key: K,
    shared: SharedLoad<V>,
) -> LoadFuture<V>
where
    K: KeyType,
    V: ValueType,
{
    async move {
        let outcome = shared.await;
        if let Some(entries) = entries.upgrade() {
            let mut entries = entries.lock();
            if let Some(entry) = entries.get_mut(&key) {
                if matches!(entry, Entry::Pending(_)) {
                    *entry = match &outcome {
                        Ok(value) => Entry::Resolved(value.clone()),
                        Err(error) => Entry::Failed(error.clone()),
                    };
                }
            }
        }
        outcome
    }
    .boxed()
}
