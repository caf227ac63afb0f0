use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::model::{CacheKey, CacheValue};

/// Process-wide keyed store of fetched collections and entities.
///
/// All operations are synchronous: the optimistic paths snapshot and
/// rewrite entries before any await point.
pub trait QueryCache: Send + Sync {
    fn read(&self, key: &CacheKey) -> Option<CacheValue>;
    /// Stores a fresh value.
    fn write(&self, key: CacheKey, value: CacheValue) {
        self.write_entry(key, value, false);
    }
    /// Stores `value` with an explicit stale mark, as when putting back a
    /// captured entry.
    fn write_entry(&self, key: CacheKey, value: CacheValue, stale: bool);
    fn is_stale(&self, key: &CacheKey) -> bool;
    /// Marks every entry under `prefix` stale so it is refetched. Returns the
    /// number of entries marked.
    fn invalidate(&self, prefix: &CacheKey) -> usize;
    /// Discards the result of any fetch under `prefix` that has not landed yet.
    fn cancel_in_flight(&self, prefix: &CacheKey);
    fn list_keys(&self, prefix: &CacheKey) -> Vec<CacheKey>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    stale: bool,
}

/// Ticket for a fetch started through [`MemoryQueryCache::begin_fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, u64>,
    next_generation: u64,
}

/// In-memory [`QueryCache`] with stale marking and cancellable fetches.
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    state: RwLock<CacheState>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_keys(&self) -> Vec<CacheKey> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a fetch for `key`. Its result is only stored if no
    /// `cancel_in_flight` covering `key` happens before it completes.
    pub fn begin_fetch(&self, key: CacheKey) -> FetchTicket {
        let mut state = self.state.write();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.in_flight.insert(key.clone(), generation);
        FetchTicket { key, generation }
    }

    /// Stores a fetch result. Returns `false` if the fetch was cancelled or
    /// superseded.
    pub fn complete_fetch(&self, ticket: FetchTicket, value: CacheValue) -> bool {
        let mut state = self.state.write();
        match state.in_flight.get(&ticket.key) {
            Some(generation) if *generation == ticket.generation => {
                state.in_flight.remove(&ticket.key);
                state.entries.insert(
                    ticket.key,
                    CacheEntry {
                        value,
                        stale: false,
                    },
                );
                true
            }
            _ => {
                debug!(key = %ticket.key, "dropping cancelled fetch result");
                false
            }
        }
    }
}

impl QueryCache for MemoryQueryCache {
    fn read(&self, key: &CacheKey) -> Option<CacheValue> {
        self.state.read().entries.get(key).map(|e| e.value.clone())
    }

    fn write_entry(&self, key: CacheKey, value: CacheValue, stale: bool) {
        self.state
            .write()
            .entries
            .insert(key, CacheEntry { value, stale });
    }

    fn is_stale(&self, key: &CacheKey) -> bool {
        self.state
            .read()
            .entries
            .get(key)
            .is_some_and(|e| e.stale)
    }

    fn invalidate(&self, prefix: &CacheKey) -> usize {
        let mut state = self.state.write();
        let mut marked = 0;
        for (_, entry) in state
            .entries
            .iter_mut()
            .filter(|(k, _)| k.starts_with(prefix))
        {
            entry.stale = true;
            marked += 1;
        }
        debug!(prefix = %prefix, marked, "invalidated");
        marked
    }

    fn cancel_in_flight(&self, prefix: &CacheKey) {
        let mut state = self.state.write();
        let before = state.in_flight.len();
        state.in_flight.retain(|k, _| !k.starts_with(prefix));
        let cancelled = before - state.in_flight.len();
        if cancelled > 0 {
            debug!(prefix = %prefix, cancelled, "cancelled in-flight fetches");
        }
    }

    fn list_keys(&self, prefix: &CacheKey) -> Vec<CacheKey> {
        self.state
            .read()
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}
