//! Copy-before-mutate for the query cache.
//!
//! A [`CacheSnapshot`] owns deep copies of every entry under one or more key
//! prefixes. It is never shared between operations, so independent rollbacks
//! cannot interfere with each other.

use std::collections::BTreeMap;

use tracing::debug;

use crate::capabilities::QueryCache;
use crate::model::{CacheKey, CacheValue, SubjectId};

#[derive(Debug, Clone, PartialEq)]
struct CapturedEntry {
    value: CacheValue,
    stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    entries: BTreeMap<CacheKey, CapturedEntry>,
}

impl CacheSnapshot {
    /// Deep-copies every entry whose key starts with one of `prefixes`,
    /// however many distinct queries or pages are cached under it.
    pub fn capture(cache: &dyn QueryCache, prefixes: &[CacheKey]) -> Self {
        let mut entries = BTreeMap::new();
        for prefix in prefixes {
            for key in cache.list_keys(prefix) {
                if let Some(value) = cache.read(&key) {
                    let stale = cache.is_stale(&key);
                    entries.insert(key, CapturedEntry { value, stale });
                }
            }
        }
        debug!(entries = entries.len(), "cache snapshot captured");
        Self { entries }
    }

    /// Writes every captured entry back verbatim, stale marks included.
    pub fn restore(&self, cache: &dyn QueryCache) {
        for (key, entry) in &self.entries {
            cache.write_entry(key.clone(), entry.value.clone(), entry.stale);
        }
        debug!(entries = self.entries.len(), "cache snapshot restored");
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Whether `key` was marked stale when captured.
    pub fn was_stale(&self, key: &CacheKey) -> Option<bool> {
        self.entries.get(key).map(|e| e.stale)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What [`apply_optimistic_removal`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// List-shaped entries that contained the subject and were rewritten.
    pub entries_rewritten: usize,
    pub items_removed: usize,
}

/// Removes `subject` from every list-shaped entry under `prefix`,
/// decrementing accompanying totals. Entity entries are left alone, and
/// rewritten entries keep their stale mark.
pub fn apply_optimistic_removal(
    cache: &dyn QueryCache,
    prefix: &CacheKey,
    subject: &SubjectId,
) -> RemovalOutcome {
    let mut outcome = RemovalOutcome::default();
    for key in cache.list_keys(prefix) {
        let Some(mut value) = cache.read(&key) else {
            continue;
        };
        if !value.is_list() {
            continue;
        }
        let removed = value.remove_subject(subject);
        if removed > 0 {
            let stale = cache.is_stale(&key);
            cache.write_entry(key, value, stale);
            outcome.entries_rewritten += 1;
            outcome.items_removed += removed;
        }
    }
    outcome
}
