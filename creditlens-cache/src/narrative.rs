//! Generate-once cache for AI narrative text.

use creditlens_core::{FetchError, Fingerprint, Narrative};
use futures_util::FutureExt;

use crate::entry::{EntryStatus, FetchFuture, PendingFetch, SettleOutcome, Settled};
use crate::key::{NarrativeKey, TupleScoped};
use crate::resource::ResourceCache;
use crate::stats::CacheStats;

/// What a narrative view should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeState {
    /// Nothing generated for the current tuple.
    NotGenerated,
    Generating,
    Ready(Narrative),
    /// Generation failed; `message` is the fixed fallback text.
    Failed { message: String },
}

impl NarrativeState {
    pub fn text(&self) -> Option<&str> {
        match self {
            NarrativeState::Ready(narrative) => Some(&narrative.text),
            NarrativeState::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Result of [`NarrativeCache::get_or_generate`] and [`NarrativeCache::refresh`].
#[derive(Debug)]
pub struct NarrativeLookup {
    pub state: NarrativeState,
    pub fetch: Option<PendingFetch<NarrativeKey, Narrative>>,
}

/// Cache of generated text keyed by the tuple that produced it.
#[derive(Debug)]
pub struct NarrativeCache {
    inner: ResourceCache<NarrativeKey, Narrative>,
}

impl Default for NarrativeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrativeCache {
    pub fn new() -> Self {
        Self {
            inner: ResourceCache::new("narrative"),
        }
    }

    /// Return cached text for `key`, generating it on first access.
    pub fn get_or_generate<F>(&mut self, key: NarrativeKey, generator: F) -> NarrativeLookup
    where
        F: FnOnce() -> FetchFuture<String>,
    {
        let fingerprint = key.fingerprint();
        let lookup = self.inner.get(key.clone(), fingerprint, timestamped(generator));
        NarrativeLookup {
            state: self.state(&key, fingerprint),
            fetch: lookup.fetch,
        }
    }

    /// Regenerate the text for `key`, replacing whatever is cached. A
    /// generation already in flight for `key` is joined, not restarted.
    pub fn refresh<F>(&mut self, key: NarrativeKey, generator: F) -> NarrativeLookup
    where
        F: FnOnce() -> FetchFuture<String>,
    {
        let fingerprint = key.fingerprint();
        let generating = self
            .inner
            .lookup(&key, fingerprint)
            .is_some_and(|entry| entry.is_pending());
        let lookup = if generating {
            self.inner.get(key.clone(), fingerprint, timestamped(generator))
        } else {
            tracing::debug!(key = %key, "Refreshing narrative");
            self.inner
                .restart(key.clone(), fingerprint, timestamped(generator))
        };
        NarrativeLookup {
            state: self.state(&key, fingerprint),
            fetch: lookup.fetch,
        }
    }

    /// State of `key` as seen under the `current` selection.
    pub fn state(&self, key: &NarrativeKey, current: Fingerprint) -> NarrativeState {
        if key.fingerprint() != current {
            return NarrativeState::NotGenerated;
        }
        match self.inner.lookup(key, current) {
            None => NarrativeState::NotGenerated,
            Some(entry) => match entry.status {
                EntryStatus::Pending => NarrativeState::Generating,
                EntryStatus::Ready => match &entry.value {
                    Some(narrative) => NarrativeState::Ready(narrative.clone()),
                    None => NarrativeState::NotGenerated,
                },
                EntryStatus::Failed => NarrativeState::Failed {
                    message: key.kind().fallback_message().to_string(),
                },
            },
        }
    }

    pub fn settle(
        &mut self,
        settled: Settled<NarrativeKey, Narrative>,
        current: Fingerprint,
    ) -> SettleOutcome {
        self.inner.settle(settled, current)
    }

    /// Drop every narrative generated under another selection.
    pub fn invalidate_stale(&mut self, current: Fingerprint) -> usize {
        self.inner.invalidate_stale(current)
    }

    pub fn clear(&mut self) -> usize {
        self.inner.clear()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NarrativeKey> {
        self.inner.keys()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

fn timestamped<F>(generator: F) -> impl FnOnce() -> FetchFuture<Narrative>
where
    F: FnOnce() -> FetchFuture<String>,
{
    move || {
        let pending = generator();
        async move {
            let text = pending.await?;
            if text.trim().is_empty() {
                return Err(FetchError::empty("narrative text"));
            }
            Ok(Narrative::new(text))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NarrativeKind;
    use creditlens_core::{ChartTab, ResolvedTuple};
    use creditlens_test_utils::fixtures::acme_tuple;
    use futures_util::future;

    fn text(value: &'static str) -> impl FnOnce() -> FetchFuture<String> {
        move || future::ready(Ok(value.to_string())).boxed()
    }

    async fn generate(cache: &mut NarrativeCache, tuple: &ResolvedTuple, value: &'static str) {
        let key = NarrativeKey::commentary(tuple.clone());
        let fetch = cache.get_or_generate(key, text(value)).fetch.unwrap();
        let settled = fetch.run().await;
        assert!(cache.settle(settled, tuple.fingerprint()).is_applied());
    }

    #[tokio::test]
    async fn test_generates_once_per_tuple() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        generate(&mut cache, &tuple, "T1").await;

        let again = cache.get_or_generate(NarrativeKey::commentary(tuple.clone()), text("T2"));
        assert!(again.fetch.is_none());
        assert_eq!(again.state.text(), Some("T1"));
    }

    #[tokio::test]
    async fn test_refresh_overwrites_text() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        generate(&mut cache, &tuple, "T1").await;

        let key = NarrativeKey::commentary(tuple.clone());
        let refresh = cache.refresh(key.clone(), text("T2"));
        assert_eq!(refresh.state, NarrativeState::Generating);
        let settled = refresh.fetch.unwrap().run().await;
        cache.settle(settled, tuple.fingerprint());
        assert_eq!(
            cache.state(&key, tuple.fingerprint()).text(),
            Some("T2")
        );
    }

    #[tokio::test]
    async fn test_refresh_joins_pending_generation() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        let key = NarrativeKey::commentary(tuple.clone());
        let first = cache.get_or_generate(key.clone(), text("T1")).fetch.unwrap();

        let refresh = cache.refresh(key.clone(), text("T2"));
        assert!(refresh.fetch.is_none());
        assert_eq!(refresh.state, NarrativeState::Generating);
        assert_eq!(cache.in_flight(), 1);

        assert!(cache.settle(first.run().await, tuple.fingerprint()).is_applied());
        assert_eq!(cache.state(&key, tuple.fingerprint()).text(), Some("T1"));
        assert_eq!(cache.stats().coalesced, 1);
    }

    #[tokio::test]
    async fn test_other_tuple_sees_not_generated() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        generate(&mut cache, &tuple, "T1").await;

        let mut later = tuple.clone();
        later.as_of_date = later.as_of_date.succ_opt().unwrap();
        let key = NarrativeKey::commentary(tuple);
        assert_eq!(
            cache.state(&key, later.fingerprint()),
            NarrativeState::NotGenerated
        );
        assert_eq!(cache.invalidate_stale(later.fingerprint()), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_fallback() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        let key = NarrativeKey::tab_insight(tuple.clone(), ChartTab::Deployment);
        let fetch = cache
            .get_or_generate(key.clone(), || {
                future::ready(Err(FetchError::network("timeout"))).boxed()
            })
            .fetch
            .unwrap();
        cache.settle(fetch.run().await, tuple.fingerprint());
        assert_eq!(
            cache.state(&key, tuple.fingerprint()),
            NarrativeState::Failed {
                message: NarrativeKind::TabInsight(ChartTab::Deployment)
                    .fallback_message()
                    .to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_blank_text_counts_as_failure() {
        let mut cache = NarrativeCache::new();
        let tuple = acme_tuple();
        let key = NarrativeKey::commentary(tuple.clone());
        let fetch = cache.get_or_generate(key.clone(), text("  ")).fetch.unwrap();
        cache.settle(fetch.run().await, tuple.fingerprint());
        assert!(matches!(
            cache.state(&key, tuple.fingerprint()),
            NarrativeState::Failed { .. }
        ));
    }
}
