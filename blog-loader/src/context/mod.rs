//! The per-request resolution context.
//!
//! A [`RequestContext`] is created when a request starts and handed by reference to every
//! field resolver of that request. It owns one cache per key-space and the coalescers feeding
//! them; nothing in it is shared with other requests. Dropping the last handle, or calling
//! [`RequestContext::cancel`], tears the request down and releases every outstanding waiter
//! with [`FetchError::Cancelled`](crate::FetchError::Cancelled).

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

mod stats;

pub(crate) use self::stats::RequestStats;
pub use self::stats::Statistics;
use crate::dispatch::Backends;
use crate::dispatch::Loaders;

/// Handle on the resolution state of one request. Cloning it is cheap; all clones share the
/// same caches.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

struct Inner {
    loaders: Loaders,
    cancel: CancellationToken,
    stats: Arc<RequestStats>,
}

impl RequestContext {
    pub(crate) fn new(backends: &Backends) -> Self {
        let cancel = CancellationToken::new();
        let stats = Arc::new(RequestStats::default());
        Self {
            inner: Arc::new(Inner {
                loaders: Loaders::new(backends, &cancel, &stats),
                cancel,
                stats,
            }),
        }
    }

    pub(crate) fn loaders(&self) -> &Loaders {
        &self.inner.loaders
    }

    /// Signal the end of a breadth level.
    ///
    /// Every key registered since the previous flush is sent to its backend, one round trip per
    /// key-space. The executor calls this once it has invoked every field resolver of the
    /// current depth that was ready to run; registrations made afterwards go to the next window.
    pub fn flush(&self) {
        tracing::trace!("end of breadth level");
        self.inner.loaders.flush();
    }

    /// Resolve one breadth level: flush the keys the given fields registered, then wait for all
    /// of them.
    ///
    /// The fields must have been created, and thus registered, before this is called; the
    /// iterator is drained before flushing.
    pub async fn resolve_level<I, F>(&self, fields: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        let fields: Vec<F> = fields.into_iter().collect();
        self.flush();
        futures::future::join_all(fields).await
    }

    /// Tear the request down: release every waiter with a cancellation, abandon in-flight
    /// batches and refuse further keys.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn statistics(&self) -> Statistics {
        self.inner.stats.snapshot()
    }
}

impl Inner {
    fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("cancelling request resolution");
        }
        self.cancel.cancel();
        self.loaders.cancel();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel();
    }
}
