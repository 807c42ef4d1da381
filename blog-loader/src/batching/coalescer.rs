use std::mem;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::BatchExecutor;
use super::BatchLoader;
use super::KeyType;
use super::executor::BatchResults;
use crate::cache::LoadFuture;
use crate::cache::Outcome;
use crate::context::RequestStats;
use crate::error::FetchError;
use crate::model::KeySpace;

type Waiter<V> = oneshot::Sender<Outcome<V>>;

/// The keys registered between two flush points, with everyone waiting on them.
pub(crate) struct BatchWindow<K, V> {
    waiters: IndexMap<K, Vec<Waiter<V>>>,
}

impl<K, V> Default for BatchWindow<K, V> {
    fn default() -> Self {
        Self {
            waiters: IndexMap::new(),
        }
    }
}

impl<K, V> BatchWindow<K, V>
where
    K: KeyType,
{
    fn register(&mut self, key: K) -> oneshot::Receiver<Outcome<V>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.entry(key).or_default().push(tx);
        rx
    }

    /// The deduplicated keys, in registration order.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.waiters.keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Hand every waiter the outcome of its key.
    fn deliver(self, results: Result<BatchResults<K, V>, FetchError>) {
        for (key, waiters) in self.waiters {
            let outcome = match &results {
                Ok(results) => Ok(results.get(&key).cloned().flatten()),
                Err(error) => Err(error.clone()),
            };
            for waiter in waiters {
                // the waiter may have been dropped by its field resolver, nothing to deliver then
                let _ = waiter.send(outcome.clone());
            }
        }
    }

    fn cancel(self, key_space: KeySpace) {
        for waiter in self.waiters.into_values().flatten() {
            let _ = waiter.send(Err(FetchError::Cancelled { key_space }));
        }
    }
}

enum WindowState<K, V> {
    Open(BatchWindow<K, V>),
    Closed,
}

/// Collects the keys registered during one breadth level and flushes them as one batch.
///
/// Flushing and cancelling both take the open window out under the same lock, so a window is
/// either handed to the executor or cancelled, never both.
pub(crate) struct KeyCoalescer<L: BatchLoader> {
    executor: BatchExecutor<L>,
    window: Mutex<WindowState<L::Key, L::Value>>,
    cancel: CancellationToken,
    stats: Arc<RequestStats>,
}

impl<L> KeyCoalescer<L>
where
    L: BatchLoader,
{
    pub(crate) fn new(
        executor: BatchExecutor<L>,
        cancel: CancellationToken,
        stats: Arc<RequestStats>,
    ) -> Self {
        Self {
            executor,
            window: Mutex::new(WindowState::Open(BatchWindow::default())),
            cancel,
            stats,
        }
    }

    pub(crate) fn executor(&self) -> &BatchExecutor<L> {
        &self.executor
    }

    fn key_space(&self) -> KeySpace {
        self.executor.key_space()
    }

    /// Add `key` to the current window.
    ///
    /// Registration happens immediately; the returned future only waits for the window to be
    /// flushed and its round trip to complete. Once the coalescer is cancelled, registrations
    /// resolve to [`FetchError::Cancelled`] without reaching the backend.
    pub(crate) fn register(&self, key: L::Key) -> LoadFuture<L::Value> {
        let key_space = self.key_space();
        let receiver = match &mut *self.window.lock() {
            WindowState::Open(window) => window.register(key),
            WindowState::Closed => {
                return futures::future::ready(Err(FetchError::Cancelled { key_space })).boxed();
            }
        };

        async move {
            receiver
                .await
                .unwrap_or(Err(FetchError::Cancelled { key_space }))
        }
        .boxed()
    }

    /// Close the current window and send its keys to the backend.
    ///
    /// The next registration opens a new window. Returns `None` when there was nothing to
    /// flush.
    pub(crate) fn flush(&self) -> Option<JoinHandle<()>> {
        let window = match &mut *self.window.lock() {
            WindowState::Open(window) if !window.is_empty() => mem::take(window),
            _ => return None,
        };

        let key_space = self.key_space();
        tracing::debug!(%key_space, keys = window.len(), "flushing batch window");
        self.stats.window_flushed();

        let executor = self.executor.clone();
        let cancel = self.cancel.clone();
        Some(tokio::spawn(async move {
            let keys = window.keys();
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = executor.execute(keys) => Some(results),
            };
            match results {
                Some(results) => window.deliver(results),
                None => {
                    tracing::debug!(%key_space, keys = window.len(), "batch window cancelled in flight");
                    window.cancel(key_space);
                }
            }
        }))
    }

    /// Release every waiter of the open window with a cancellation and refuse further keys.
    pub(crate) fn cancel(&self) {
        let previous = mem::replace(&mut *self.window.lock(), WindowState::Closed);
        if let WindowState::Open(window) = previous {
            if !window.is_empty() {
                tracing::debug!(key_space = %self.key_space(), keys = window.len(), "cancelling batch window");
            }
            window.cancel(self.key_space());
        }
    }
}
