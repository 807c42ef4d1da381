use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde::Serialize;

/// Counters shared by the caches and coalescers of one request.
#[derive(Debug, Default)]
pub(crate) struct RequestStats {
    keys_requested: AtomicUsize,
    cache_hits: AtomicUsize,
    windows_flushed: AtomicUsize,
}

impl RequestStats {
    pub(crate) fn key_requested(&self) {
        self.keys_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn window_flushed(&self) {
        self.windows_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Statistics {
        Statistics {
            keys_requested: self.keys_requested.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            windows_flushed: self.windows_flushed.load(Ordering::Relaxed),
        }
    }
}

/// Resolution statistics of one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Lookups issued by field resolvers, cache hits included.
    pub keys_requested: usize,
    /// Lookups answered by an existing entry, resolved or still pending.
    pub cache_hits: usize,
    /// Batch windows handed to a backend.
    pub windows_flushed: usize,
}
