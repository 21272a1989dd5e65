//! Query/mutation orchestration: a request cache keyed by structured
//! keys.
//!
//! Reads deduplicate concurrent fetches per key, retry a bounded
//! number of times, and expire after a time-to-live. Staleness is
//! visible, not destructive: a stale read hands back the last known
//! value immediately and refreshes in the background. Mutations carry
//! a pending flag and invalidate their related query keys on success.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use swwap_shared::ClientError;

use crate::config::ClientConfig;

/// Structured cache key, e.g. `QueryKey::new(["listing", id])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Per-read configuration; unset fields fall back to the client-wide
/// defaults (5 minutes / 2 retries out of the box).
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub key: QueryKey,
    pub ttl: Option<Duration>,
    pub retries: Option<u32>,
    pub refetch_interval: Option<Duration>,
}

impl QuerySpec {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            ttl: None,
            retries: None,
            refetch_interval: None,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

/// Observable lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Fresh,
    Stale,
    Fetching,
    Error,
}

type StoredValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<StoredValue, ClientError>;
type BoxedFetch = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

struct CacheEntry {
    data: Option<StoredValue>,
    fetched_at: Option<Instant>,
    last_error: Option<ClientError>,
    inflight: Option<broadcast::Sender<FetchResult>>,
    fetch: BoxedFetch,
    ttl: Duration,
    retries: u32,
    has_refresher: bool,
}

impl CacheEntry {
    fn new(fetch: BoxedFetch, ttl: Duration, retries: u32) -> Self {
        Self {
            data: None,
            fetched_at: None,
            last_error: None,
            inflight: None,
            fetch,
            ttl,
            retries,
            has_refresher: false,
        }
    }

    fn is_fresh(&self) -> bool {
        self.data.is_some()
            && self
                .fetched_at
                .is_some_and(|at| at.elapsed() < self.ttl)
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    default_ttl: Duration,
    default_retries: u32,
}

#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

enum Plan {
    /// Cached value, good as-is (or a refresh is already running).
    Cached(StoredValue),
    /// Cached value handed back now, refetch spawned in the background.
    StaleRefetch(StoredValue, broadcast::Sender<FetchResult>),
    /// Another caller's fetch is in flight; wait for its result.
    Join(broadcast::Receiver<FetchResult>),
    /// Nothing cached, nothing running; this caller fetches.
    Fetch(broadcast::Sender<FetchResult>),
}

impl QueryClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                default_ttl: config.query_ttl,
                default_retries: config.query_retries,
            }),
        }
    }

    /// Read through the cache.
    ///
    /// At most one fetch per key is ever in flight; concurrent callers
    /// share its result. A failing fetch is retried up to the
    /// configured count before the last error is surfaced. Stale data
    /// is returned immediately while a background refetch runs.
    pub async fn query<T, F, Fut>(
        &self,
        spec: QuerySpec,
        fetch: F,
    ) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let key = spec.key.clone();
        let ttl = spec.ttl.unwrap_or(self.inner.default_ttl);
        let retries = spec.retries.unwrap_or(self.inner.default_retries);
        let fetch: BoxedFetch = Arc::new(move || {
            let fut = fetch();
            Box::pin(async move { fut.await.map(|v| Arc::new(v) as StoredValue) })
        });

        let mut start_refresher = None;
        let plan = {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(fetch.clone(), ttl, retries));
            // Later calls may carry updated parameters; background
            // refreshes always use the latest.
            entry.fetch = fetch;
            entry.ttl = ttl;
            entry.retries = retries;

            if let Some(interval) = spec.refetch_interval {
                if !entry.has_refresher {
                    entry.has_refresher = true;
                    start_refresher = Some(interval);
                }
            }

            if let Some(data) = entry.data.clone() {
                if entry.is_fresh() || entry.inflight.is_some() {
                    Plan::Cached(data)
                } else {
                    let (tx, _) = broadcast::channel(1);
                    entry.inflight = Some(tx.clone());
                    Plan::StaleRefetch(data, tx)
                }
            } else if let Some(tx) = &entry.inflight {
                Plan::Join(tx.subscribe())
            } else {
                let (tx, _) = broadcast::channel(1);
                entry.inflight = Some(tx.clone());
                Plan::Fetch(tx)
            }
        };

        if let Some(interval) = start_refresher {
            self.spawn_refresher(key.clone(), interval);
        }

        match plan {
            Plan::Cached(data) => downcast(data),
            Plan::StaleRefetch(data, tx) => {
                debug!("query {key} is stale, refetching in background");
                let client = self.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let _ = client.run_fetch(&key, tx).await;
                });
                downcast(data)
            }
            Plan::Join(mut rx) => match rx.recv().await {
                Ok(result) => result.and_then(downcast),
                Err(_) => Err(ClientError::Remote {
                    status: 500,
                    message: "query was abandoned".to_string(),
                }),
            },
            Plan::Fetch(tx) => self.run_fetch(&key, tx).await.and_then(downcast),
        }
    }

    /// Run the entry's fetch with retries, record the outcome, and
    /// wake every waiter.
    async fn run_fetch(
        &self,
        key: &QueryKey,
        tx: broadcast::Sender<FetchResult>,
    ) -> FetchResult {
        let (fetch, retries) = {
            let entries = self.inner.entries.lock().await;
            match entries.get(key) {
                Some(entry) => (entry.fetch.clone(), entry.retries),
                None => {
                    // Entry was removed while we were scheduled.
                    let err = ClientError::Remote {
                        status: 500,
                        message: "query was abandoned".to_string(),
                    };
                    let _ = tx.send(Err(err.clone()));
                    return Err(err);
                }
            }
        };

        let mut attempt = 0u32;
        let result = loop {
            match fetch().await {
                Ok(value) => break Ok(value),
                Err(e) => {
                    if attempt >= retries {
                        break Err(e);
                    }
                    attempt += 1;
                    debug!("query {key} attempt {attempt} failed, retrying: {e}");
                }
            }
        };

        {
            let mut entries = self.inner.entries.lock().await;
            if let Some(entry) = entries.get_mut(key) {
                entry.inflight = None;
                match &result {
                    Ok(value) => {
                        entry.data = Some(value.clone());
                        entry.fetched_at = Some(Instant::now());
                        entry.last_error = None;
                    }
                    Err(e) => {
                        warn!("query {key} failed after {} attempts: {e}", attempt + 1);
                        entry.last_error = Some(e.clone());
                    }
                }
            }
        }

        let _ = tx.send(result.clone());
        result
    }

    fn spawn_refresher(&self, key: QueryKey, interval: Duration) {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let tx = {
                    let mut entries = client.inner.entries.lock().await;
                    let Some(entry) = entries.get_mut(&key) else {
                        break;
                    };
                    if entry.inflight.is_some() {
                        continue;
                    }
                    let (tx, _) = broadcast::channel(1);
                    entry.inflight = Some(tx.clone());
                    tx
                };
                let _ = client.run_fetch(&key, tx).await;
            }
            debug!("periodic refetch for {key} stopped");
        });
    }

    /// Force the next read of this key to refetch regardless of
    /// freshness. Cached data stays available for stale reads.
    pub async fn invalidate(&self, key: &QueryKey) {
        let mut entries = self.inner.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.fetched_at = None;
        }
    }

    /// Invalidate every key under a prefix (e.g. all listing reads).
    pub async fn invalidate_prefix(&self, prefix: &QueryKey) {
        let mut entries = self.inner.entries.lock().await;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.fetched_at = None;
            }
        }
    }

    /// Drop a key entirely, stopping its periodic refetch task.
    pub async fn remove(&self, key: &QueryKey) {
        self.inner.entries.lock().await.remove(key);
    }

    /// Observable state of a cached entry, if any.
    pub async fn state(&self, key: &QueryKey) -> Option<QueryState> {
        let entries = self.inner.entries.lock().await;
        let entry = entries.get(key)?;
        if entry.inflight.is_some() {
            Some(QueryState::Fetching)
        } else if entry.is_fresh() {
            Some(QueryState::Fresh)
        } else if entry.data.is_some() {
            Some(QueryState::Stale)
        } else if entry.last_error.is_some() {
            Some(QueryState::Error)
        } else {
            None
        }
    }

    /// Build a mutation that invalidates the given keys when its write
    /// succeeds.
    pub fn mutation<I>(&self, invalidates: I) -> Mutation
    where
        I: IntoIterator<Item = QueryKey>,
    {
        let (pending, _) = watch::channel(false);
        Mutation {
            client: self.clone(),
            invalidates: invalidates.into_iter().collect(),
            pending,
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: StoredValue) -> Result<Arc<T>, ClientError> {
    value
        .downcast::<T>()
        .map_err(|_| ClientError::Deserialize("query cache type mismatch".to_string()))
}

/// A single write wrapped with pending status and success-side cache
/// invalidation. The success arm is the only place query keys get
/// invalidated; errors surface to the caller untouched.
pub struct Mutation {
    client: QueryClient,
    invalidates: Vec<QueryKey>,
    pending: watch::Sender<bool>,
}

impl Mutation {
    pub fn is_pending(&self) -> bool {
        *self.pending.borrow()
    }

    /// Watch the pending flag (the UI disables its submit control on
    /// true).
    pub fn pending_changes(&self) -> watch::Receiver<bool> {
        self.pending.subscribe()
    }

    /// Run the write. Never retries.
    pub async fn run<T, Fut>(&self, op: Fut) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.pending.send_replace(true);
        let result = op.await;
        match &result {
            Ok(_) => {
                for key in &self.invalidates {
                    self.client.invalidate(key).await;
                }
            }
            Err(e) => warn!("mutation failed: {e}"),
        }
        self.pending.send_replace(false);
        result
    }
}
