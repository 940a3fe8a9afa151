//! In-memory request cache with time-bounded entries and in-flight coalescing.
//!
//! Each logical resource gets its own [`RequestCache`]. A lookup first consults the
//! entry table (lazy expiry: stale entries are ignored, never purged on read), then the
//! pending table of fetches that have not settled yet, and only then starts a new fetch.
//! Every caller asking for a key while its fetch is in flight awaits the same shared
//! future, so there is at most one underlying request per key at any time.
//!
//! The caller that starts a fetch owns it: its cancellation token aborts the shared request
//! and frees the key at once, even if nobody polls the aborted request again. Every caller,
//! owner or joiner, also stops waiting as soon as its own token fires.

use crate::clock::Clock;
use crate::{DashboardError, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A cached value and the time it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at_epoch_millis: i64,
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

struct PendingRequest<T: Clone> {
    id: u64,
    /// Token of the caller that started the request
    owner: Option<CancellationToken>,
    fetch: SharedFetch<T>,
}

impl<T: Clone> PendingRequest<T> {
    fn is_abandoned(&self) -> bool {
        self.owner.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

struct Tables<T: Clone> {
    entries: HashMap<String, CacheEntry<T>>,
    pending: HashMap<String, PendingRequest<T>>,
    next_id: u64,
}

impl<T: Clone> Default for Tables<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            pending: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T: Clone> Tables<T> {
    /// Forget requests whose owner has cancelled; returns them so they drop outside the lock
    fn take_abandoned(&mut self) -> Vec<PendingRequest<T>> {
        let keys: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.is_abandoned())
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().filter_map(|key| self.pending.remove(key)).collect()
    }
}

/// TTL cache plus pending-request registry for one resource type
pub struct RequestCache<T: Clone + Send + Sync + 'static> {
    name: &'static str,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
    tables: Arc<Mutex<Tables<T>>>,
}

impl<T: Clone + Send + Sync + 'static> RequestCache<T> {
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    /// Return the live entry for `key`, join its in-flight fetch, or start `fetch`.
    ///
    /// `fetch` is only invoked when neither a live entry nor a pending request exists.
    /// On success the value is stored with the current timestamp; on failure nothing is
    /// stored. Either way the pending entry is removed so a later caller can retry.
    /// Triggering `cancel` makes this call fail with [`DashboardError::Cancelled`]; when this
    /// call started the fetch, it also aborts the fetch for everyone waiting on it.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, cancel: Option<&CancellationToken>, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (shared, abandoned) = {
            let mut tables = self.tables.lock();
            let abandoned = tables.take_abandoned();

            if let Some(entry) = tables.entries.get(key) {
                if self.is_live(entry) {
                    let value = entry.value.clone();
                    drop(tables);
                    drop(abandoned);
                    debug!(cache = self.name, key, "Cache hit");
                    return Ok(value);
                }
                debug!(cache = self.name, key, "Key found but expired");
            }

            let shared = if let Some(pending) = tables.pending.get(key) {
                debug!(cache = self.name, key, "Joining in-flight request");
                pending.fetch.clone()
            } else {
                let id = tables.next_id;
                tables.next_id += 1;
                let owner = cancel.cloned();
                let work = cancellable(fetch(), owner.clone());
                let shared = self.settle(key.to_string(), id, work).boxed().shared();
                tables.pending.insert(
                    key.to_string(),
                    PendingRequest {
                        id,
                        owner,
                        fetch: shared.clone(),
                    },
                );
                debug!(cache = self.name, key, id, "Registered new request");
                shared
            };
            (shared, abandoned)
        };
        if !abandoned.is_empty() {
            debug!(cache = self.name, count = abandoned.len(), "Dropped cancelled requests");
        }
        drop(abandoned);

        cancellable(shared, cancel.cloned()).await
    }

    /// Wraps the raw fetch so that, whoever polls it to completion, the tables are updated exactly once.
    fn settle<Fut>(&self, key: String, id: u64, fetch: Fut) -> impl Future<Output = Result<T>> + Send + 'static
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let tables = Arc::clone(&self.tables);
        let clock = Arc::clone(&self.clock);
        let name = self.name;

        async move {
            let result = fetch.await;

            let mut guard = tables.lock();
            // A flush may have dropped this request; a newer one may own the key now.
            let still_registered = guard.pending.get(&key).is_some_and(|p| p.id == id);
            let finished = if still_registered {
                guard.pending.remove(&key)
            } else {
                None
            };

            match &result {
                Ok(value) if still_registered => {
                    guard.entries.insert(
                        key.clone(),
                        CacheEntry {
                            value: value.clone(),
                            fetched_at_epoch_millis: clock.now_millis(),
                        },
                    );
                    debug!(cache = name, key = %key, "Stored fresh entry");
                }
                Ok(_) => debug!(cache = name, key = %key, "Request settled after flush, not stored"),
                Err(err) if err.is_cancelled() => debug!(cache = name, key = %key, "Request cancelled"),
                Err(err) => warn!(cache = name, key = %key, error = %err, "Request failed"),
            }

            drop(guard);
            drop(finished);
            result
        }
    }

    fn is_live(&self, entry: &CacheEntry<T>) -> bool {
        self.clock.now_millis() - entry.fetched_at_epoch_millis < self.ttl_millis
    }

    /// Live value for `key` without fetching
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<T> {
        let tables = self.tables.lock();
        tables
            .entries
            .get(key)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.value.clone())
    }

    /// Whether a fetch for `key` is in flight; cancelled ones are not
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.tables
            .lock()
            .pending
            .get(key)
            .is_some_and(|p| !p.is_abandoned())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tables.lock().pending.values().filter(|p| !p.is_abandoned()).count()
    }

    /// Drop every entry and forget every pending request
    pub fn clear_all(&self) {
        let flushed = {
            let mut tables = self.tables.lock();
            let next_id = tables.next_id;
            let flushed = std::mem::take(&mut *tables);
            // Ids keep increasing so a flushed request can never match a newer one
            tables.next_id = next_id;
            flushed
        };
        debug!(
            cache = self.name,
            entries = flushed.entries.len(),
            pending = flushed.pending.len(),
            "Cleared cache"
        );
        drop(flushed);
    }

    /// Remove entries whose key contains `pattern`; returns how many were removed
    pub fn clear_matching(&self, pattern: &str) -> usize {
        let removed: Vec<CacheEntry<T>> = {
            let mut tables = self.tables.lock();
            let keys: Vec<String> = tables
                .entries
                .keys()
                .filter(|key| key.contains(pattern))
                .cloned()
                .collect();
            keys.iter().filter_map(|key| tables.entries.remove(key)).collect()
        };
        debug!(cache = self.name, pattern, removed = removed.len(), "Cleared matching entries");
        removed.len()
    }

    /// Number of stored entries, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.tables.lock().entries.keys().cloned().collect()
    }
}

/// Race `work` against the token; dropping `work` aborts its outstanding requests
async fn cancellable<T, F>(work: F, cancel: Option<CancellationToken>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(DashboardError::Cancelled),
                result = work => result,
            }
        }
        None => work.await,
    }
}
