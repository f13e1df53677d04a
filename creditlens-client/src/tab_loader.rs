//! Lazy chart loading for the active tab.

use std::sync::Arc;

use creditlens_cache::{CacheEntry, ChartKey, Lookup, ResourceCache};
use creditlens_core::{AnalyticsBackend, ChartPayload, ChartTab, ResolvedTuple};
use futures_util::FutureExt;

use crate::tabs::Tab;

/// Populates the chart cache for the active tab only.
///
/// Switching tabs never cancels an earlier request; its result still lands
/// in the cache.
pub struct TabLoader<B> {
    backend: Arc<B>,
    active: Tab,
}

impl<B> TabLoader<B>
where
    B: AnalyticsBackend + 'static,
{
    pub fn new(backend: Arc<B>, active: Tab) -> Self {
        Self { backend, active }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Returns whether the active tab changed.
    pub fn activate(&mut self, tab: Tab) -> bool {
        if self.active == tab {
            return false;
        }
        tracing::debug!(from = %self.active.slug(), to = %tab.slug(), "Tab activated");
        self.active = tab;
        true
    }

    /// Chart entry for the active tab, fetching it if nothing is cached or
    /// in flight for `tuple`. `None` for the Overview tab.
    pub fn load(
        &self,
        tuple: &ResolvedTuple,
        charts: &mut ResourceCache<ChartKey, ChartPayload>,
    ) -> Option<Lookup<ChartKey, ChartPayload>> {
        let chart = self.active.chart_tab()?;
        Some(self.load_chart(tuple, chart, charts))
    }

    pub fn load_chart(
        &self,
        tuple: &ResolvedTuple,
        chart: ChartTab,
        charts: &mut ResourceCache<ChartKey, ChartPayload>,
    ) -> Lookup<ChartKey, ChartPayload> {
        let key = ChartKey::new(tuple.clone(), chart);
        let backend = Arc::clone(&self.backend);
        let request = tuple.clone();
        charts.get(key, tuple.fingerprint(), move || {
            async move { backend.chart(&request, chart).await }.boxed()
        })
    }

    /// Cached entry for the active tab under `tuple`. Never fetches.
    pub fn entry<'a>(
        &self,
        tuple: &ResolvedTuple,
        charts: &'a ResourceCache<ChartKey, ChartPayload>,
    ) -> Option<&'a CacheEntry<ChartPayload>> {
        let chart = self.active.chart_tab()?;
        charts.lookup(&ChartKey::new(tuple.clone(), chart), tuple.fingerprint())
    }
}

impl<B> std::fmt::Debug for TabLoader<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabLoader")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
