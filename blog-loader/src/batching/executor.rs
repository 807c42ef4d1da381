use std::sync::Arc;

use indexmap::IndexMap;
use tracing::Instrument;

use super::BatchLoader;
use crate::cache::Outcome;
use crate::error::FetchError;
use crate::model::KeySpace;

/// Per-key results of one round trip, in the order the keys were requested. `None` marks a key
/// the backend does not know.
pub(crate) type BatchResults<K, V> = IndexMap<K, Option<Arc<V>>>;

/// Turns a key set into exactly one backend round trip.
pub(crate) struct BatchExecutor<L> {
    loader: Arc<L>,
}

impl<L> Clone for BatchExecutor<L> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
        }
    }
}

impl<L> BatchExecutor<L>
where
    L: BatchLoader,
{
    pub(crate) fn new(loader: Arc<L>) -> Self {
        Self { loader }
    }

    pub(crate) fn key_space(&self) -> KeySpace {
        self.loader.key_space()
    }

    /// Load `keys` with a single call to the backend.
    ///
    /// Every requested key is present in the result. A failed call fails every key at once: the
    /// round trip is atomic from the point of view of its waiters. An empty key set never
    /// reaches the backend.
    pub(crate) async fn execute(
        &self,
        keys: Vec<L::Key>,
    ) -> Result<BatchResults<L::Key, L::Value>, FetchError> {
        if keys.is_empty() {
            return Ok(IndexMap::new());
        }

        let key_space = self.key_space();
        let mut found = self
            .loader
            .load(&keys)
            .instrument(tracing::info_span!(
                "batch_executor::execute",
                key_space = %key_space,
                keys = keys.len()
            ))
            .await
            .inspect_err(|error| {
                tracing::warn!(%key_space, keys = keys.len(), %error, "batch load failed");
            })?;

        let results: BatchResults<_, _> = keys
            .into_iter()
            .map(|key| {
                let value = found.remove(&key).map(Arc::new);
                (key, value)
            })
            .collect();
        tracing::debug!(
            %key_space,
            keys = results.len(),
            missing = results.values().filter(|value| value.is_none()).count(),
            "batch loaded"
        );
        Ok(results)
    }

    /// Load a single key, for lookups that have nothing to coalesce with.
    pub(crate) async fn execute_one(&self, key: L::Key) -> Outcome<L::Value> {
        let mut results = self.execute(vec![key.clone()]).await?;
        Ok(results.swap_remove(&key).flatten())
    }
}
