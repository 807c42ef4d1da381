//! Coalescing of key lookups into batched backend round trips.
//!
//! A [`KeyCoalescer`] accumulates the keys registered during one breadth level of field
//! resolution in a batch window. When the executor signals the end of the level, the window
//! is flushed: its deduplicated keys go to a [`BatchExecutor`], which performs exactly one call
//! to the [`BatchLoader`] and fans the per-key outcomes back out to every waiter.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::KeySpace;

mod coalescer;
mod executor;
mod loader;

pub(crate) use self::coalescer::KeyCoalescer;
pub(crate) use self::executor::BatchExecutor;
pub(crate) use self::loader::CachedLoader;

pub(crate) trait KeyType: Clone + fmt::Debug + Hash + Eq + Send + Sync + 'static {}
pub(crate) trait ValueType: Send + Sync + 'static {}

// Blanket implementation which satisfies the compiler
impl<K> KeyType for K
where
    K: Clone + fmt::Debug + Hash + Eq + Send + Sync + 'static,
{
    // Nothing to implement, since K already supports the other traits.
}

// Blanket implementation which satisfies the compiler
impl<V> ValueType for V where V: Send + Sync + 'static {}

/// A backend able to answer "fetch records by key set" in one round trip.
#[async_trait]
pub(crate) trait BatchLoader: Send + Sync + 'static {
    type Key: KeyType;
    type Value: ValueType;

    fn key_space(&self) -> KeySpace;

    /// Fetch the records for `keys`.
    ///
    /// Keys unknown to the backend are simply left out of the returned map. Any error fails
    /// the whole call.
    async fn load(
        &self,
        keys: &[Self::Key],
    ) -> Result<HashMap<Self::Key, Self::Value>, FetchError>;
}
