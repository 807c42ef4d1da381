use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::BatchExecutor;
use super::BatchLoader;
use super::KeyCoalescer;
use crate::cache::LoadFuture;
use crate::cache::RequestCache;
use crate::context::RequestStats;

/// The cache and coalescer of one key-space of one request.
///
/// Both lookup paths go through the same cache, so a key is loaded at most once per request
/// whichever path asked for it first.
pub(crate) struct CachedLoader<L: BatchLoader> {
    cache: RequestCache<L::Key, L::Value>,
    coalescer: KeyCoalescer<L>,
}

impl<L> CachedLoader<L>
where
    L: BatchLoader,
{
    pub(crate) fn new(
        loader: Arc<L>,
        cancel: &CancellationToken,
        stats: &Arc<RequestStats>,
    ) -> Self {
        let key_space = loader.key_space();
        Self {
            cache: RequestCache::new(key_space, cancel.clone(), stats.clone()),
            coalescer: KeyCoalescer::new(
                BatchExecutor::new(loader),
                cancel.clone(),
                stats.clone(),
            ),
        }
    }

    /// Look `key` up, coalescing a cache miss with the other keys of the current window.
    pub(crate) fn load(&self, key: L::Key) -> LoadFuture<L::Value> {
        self.cache.get_or_load(key, |key| self.coalescer.register(key))
    }

    /// Look `key` up, sending a cache miss to the backend on its own.
    pub(crate) fn load_now(&self, key: L::Key) -> LoadFuture<L::Value> {
        let executor = self.coalescer.executor().clone();
        self.cache.get_or_load(key, move |key| {
            async move { executor.execute_one(key).await }.boxed()
        })
    }

    pub(crate) fn flush(&self) {
        self.coalescer.flush();
    }

    pub(crate) fn cancel(&self) {
        self.coalescer.cancel();
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &RequestCache<L::Key, L::Value> {
        &self.cache
    }
}
