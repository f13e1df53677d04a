//! Keyed cache for asynchronous fetch results.
//!
//! The cache never awaits anything itself. [`ResourceCache::get`] decides
//! whether a request is needed and, if so, hands back a [`PendingFetch`]
//! for the caller to drive. The completion comes back through
//! [`ResourceCache::settle`], which applies it only when it still belongs to
//! the current selection and to the entry's latest request.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use creditlens_core::Fingerprint;

use crate::entry::{
    CacheEntry, DiscardReason, EntryStatus, FetchFuture, PendingFetch, SettleOutcome, Settled,
};
use crate::stats::CacheStats;

/// Result of a [`ResourceCache::get`].
#[derive(Debug)]
pub struct Lookup<K, T> {
    /// The entry as it stands after the lookup.
    pub entry: CacheEntry<T>,
    /// Present only when this lookup issued a new request.
    pub fetch: Option<PendingFetch<K, T>>,
}

impl<K, T> Lookup<K, T> {
    pub fn issued_request(&self) -> bool {
        self.fetch.is_some()
    }
}

/// Single-writer cache of Pending/Ready/Failed entries.
pub struct ResourceCache<K, T> {
    name: &'static str,
    entries: HashMap<K, CacheEntry<T>>,
    stats: CacheStats,
}

impl<K, T> ResourceCache<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    /// Create an empty cache. `name` labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the entry for `key`, issuing a request when needed.
    ///
    /// A Pending or Ready entry with a matching fingerprint is returned as is.
    /// A Failed entry is retried. A missing entry, or one captured under a
    /// different fingerprint, is replaced by a new Pending entry and `fetcher`
    /// is invoked exactly once.
    pub fn get<F>(&mut self, key: K, fingerprint: Fingerprint, fetcher: F) -> Lookup<K, T>
    where
        F: FnOnce() -> FetchFuture<T>,
    {
        if let Some(entry) = self.entries.get(&key) {
            if entry.tuple_fingerprint == fingerprint {
                match entry.status {
                    EntryStatus::Pending => {
                        self.stats.coalesced += 1;
                        tracing::trace!(cache = self.name, key = %key, "Joined in-flight request");
                        return Lookup {
                            entry: entry.clone(),
                            fetch: None,
                        };
                    }
                    EntryStatus::Ready => {
                        self.stats.hits += 1;
                        return Lookup {
                            entry: entry.clone(),
                            fetch: None,
                        };
                    }
                    EntryStatus::Failed => {
                        tracing::debug!(cache = self.name, key = %key, "Retrying failed entry");
                    }
                }
            }
        }

        self.stats.misses += 1;
        self.start(key, fingerprint, fetcher)
    }

    /// Replace any entry for `key` with a new request, even if one is in
    /// flight. The older request's completion will be discarded.
    pub fn restart<F>(&mut self, key: K, fingerprint: Fingerprint, fetcher: F) -> Lookup<K, T>
    where
        F: FnOnce() -> FetchFuture<T>,
    {
        self.stats.misses += 1;
        self.start(key, fingerprint, fetcher)
    }

    fn start<F>(&mut self, key: K, fingerprint: Fingerprint, fetcher: F) -> Lookup<K, T>
    where
        F: FnOnce() -> FetchFuture<T>,
    {
        let entry = CacheEntry::pending(fingerprint);
        let ticket = entry.ticket(key.clone());
        tracing::debug!(
            cache = self.name,
            key = %key,
            request_id = %entry.request_id,
            fingerprint = %fingerprint.short(),
            "Issuing fetch"
        );
        let snapshot = entry.clone();
        self.entries.insert(key, entry);
        Lookup {
            entry: snapshot,
            fetch: Some(PendingFetch {
                ticket,
                future: fetcher(),
            }),
        }
    }

    /// Apply a completed fetch.
    ///
    /// The result is stored only if the fingerprint captured at request time
    /// equals `current` and the entry still belongs to that request.
    pub fn settle(&mut self, settled: Settled<K, T>, current: Fingerprint) -> SettleOutcome {
        let Settled { ticket, result } = settled;

        if ticket.fingerprint != current {
            let owns_entry = self
                .entries
                .get(&ticket.key)
                .map(|e| e.request_id == ticket.request_id)
                .unwrap_or(false);
            if owns_entry {
                self.entries.remove(&ticket.key);
            }
            self.stats.discarded += 1;
            tracing::debug!(
                cache = self.name,
                key = %ticket.key,
                request_id = %ticket.request_id,
                "Discarding response for superseded selection"
            );
            return SettleOutcome::Discarded(DiscardReason::Superseded);
        }

        match self.entries.get_mut(&ticket.key) {
            Some(entry) if entry.request_id == ticket.request_id => {
                entry.resolve(result);
                if let Some(error) = &entry.error {
                    tracing::warn!(
                        cache = self.name,
                        key = %ticket.key,
                        error = %error,
                        "Fetch failed"
                    );
                }
                SettleOutcome::Applied(entry.status)
            }
            _ => {
                self.stats.discarded += 1;
                tracing::debug!(
                    cache = self.name,
                    key = %ticket.key,
                    request_id = %ticket.request_id,
                    "Discarding response for replaced entry"
                );
                SettleOutcome::Discarded(DiscardReason::Orphaned)
            }
        }
    }

    /// Entry for `key` regardless of fingerprint. Never fetches.
    pub fn peek(&self, key: &K) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    /// Entry for `key` if it was captured under `fingerprint`. Never fetches.
    pub fn lookup(&self, key: &K, fingerprint: Fingerprint) -> Option<&CacheEntry<T>> {
        self.entries
            .get(key)
            .filter(|entry| entry.tuple_fingerprint == fingerprint)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<T>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.stats.invalidated += 1;
        }
        removed
    }

    /// Remove every entry whose key matches `predicate`.
    pub fn invalidate<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        let removed = before - self.entries.len();
        self.record_invalidated(removed, "predicate");
        removed
    }

    /// Remove every entry not captured under `current`.
    pub fn invalidate_stale(&mut self, current: Fingerprint) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.tuple_fingerprint == current);
        let removed = before - self.entries.len();
        self.record_invalidated(removed, "superseded");
        removed
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.record_invalidated(removed, "clear");
        removed
    }

    fn record_invalidated(&mut self, removed: usize, reason: &'static str) {
        if removed > 0 {
            self.stats.invalidated += removed as u64;
            tracing::debug!(cache = self.name, removed, reason, "Invalidated entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still waiting on a response.
    pub fn in_flight(&self) -> usize {
        self.entries.values().filter(|e| e.is_pending()).count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, &CacheEntry<T>)> {
        self.entries.iter()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K, T> fmt::Debug for ResourceCache<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
