use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tracing::debug;

use super::Optimistic;
use crate::app::Result;

/// Opaque cache address, e.g. `["subscriptions", "0"]`.
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

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

pub type QueryFetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

struct Slot<T> {
    data: Vec<Optimistic<T>>,
    generation: u64,
    stale: bool,
    fetcher: Option<QueryFetcher<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            generation: 0,
            stale: false,
            fetcher: None,
        }
    }
}

/// List-shaped query cache the mutation engine writes optimistic data into.
///
/// The lock is never held across an await; fetch results are only written
/// back if no `cancel_queries` happened while the fetch was in flight.
pub struct QueryCache<T> {
    slots: Mutex<HashMap<QueryKey, Slot<T>>>,
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot<T>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Vec<Optimistic<T>> {
        self.lock()
            .get(key)
            .map(|slot| slot.data.clone())
            .unwrap_or_default()
    }

    /// Plain values, markers stripped.
    pub fn values(&self, key: &QueryKey) -> Vec<T> {
        self.get(key).into_iter().map(Optimistic::into_inner).collect()
    }

    pub fn set(&self, key: &QueryKey, data: Vec<Optimistic<T>>) {
        self.lock().entry(key.clone()).or_default().data = data;
    }

    /// Store server data as confirmed items.
    pub fn set_values(&self, key: &QueryKey, values: Vec<T>) {
        self.set(key, values.into_iter().map(Optimistic::confirmed).collect());
    }

    /// Discard the result of any fetch currently in flight for `key`.
    pub fn cancel_queries(&self, key: &QueryKey) {
        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        slot.generation += 1;
    }

    /// Run `fetch` and write its result unless the key was cancelled
    /// meanwhile. Returns whether the result was written.
    pub async fn fetch<F>(&self, key: &QueryKey, fetch: F) -> Result<bool>
    where
        F: Future<Output = Result<Vec<T>>>,
    {
        let generation = self.lock().entry(key.clone()).or_default().generation;
        let values = fetch.await?;

        let mut slots = self.lock();
        let slot = slots.entry(key.clone()).or_default();
        if slot.generation != generation {
            debug!(key = %key, "Discarding cancelled query result");
            return Ok(false);
        }
        slot.data = values.into_iter().map(Optimistic::confirmed).collect();
        slot.stale = false;
        Ok(true)
    }

    pub fn register_query(&self, key: &QueryKey, fetcher: QueryFetcher<T>) {
        self.lock().entry(key.clone()).or_default().fetcher = Some(fetcher);
    }

    /// Mark `key` stale and refetch it if a fetcher is registered.
    pub async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        let fetcher = {
            let mut slots = self.lock();
            let slot = slots.entry(key.clone()).or_default();
            slot.stale = true;
            slot.fetcher.clone()
        };
        if let Some(fetcher) = fetcher {
            self.fetch(key, fetcher()).await?;
        }
        Ok(())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock().get(key).is_some_and(|slot| slot.stale)
    }
}

impl<T> Default for QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
