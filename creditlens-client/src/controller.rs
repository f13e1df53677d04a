//! View controller: the single writer of selection and cache state.
//!
//! Backend requests run as spawned tasks that report back over an mpsc
//! channel. The controller applies each completion in [`handle`], which is
//! where stale responses are dropped and downstream defaults are chosen.
//!
//! [`handle`]: ViewController::handle

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use creditlens_cache::{
    CacheEntry, CacheStats, ChartKey, EntryStatus, NarrativeCache, NarrativeKey, NarrativeKind,
    NarrativeState, PendingFetch, ResourceCache, Settled,
};
use creditlens_core::{
    AnalyticsBackend, ChartPayload, ChatTurn, Choice, CompanyId, Currency, DateRange, FetchError,
    Fingerprint, Level, PortfolioSummary, ProductConfig, ProductId, ResolvedTuple, Selection,
    Snapshot,
};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::chat::ChatTranscript;
use crate::events::ControllerEvent;
use crate::params::{ChangeEvent, ParameterStore, SelectOutcome};
use crate::persistence::PersistedState;
use crate::tab_loader::TabLoader;
use crate::tabs::Tab;

// ============================================================================
// VIEW MODEL
// ============================================================================

/// Display state of one piece of data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum LoadState<T> {
    NotRequested,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            LoadState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Clone> From<&CacheEntry<T>> for LoadState<T> {
    fn from(entry: &CacheEntry<T>) -> Self {
        match entry.status {
            EntryStatus::Pending => LoadState::Loading,
            EntryStatus::Ready => match &entry.value {
                Some(value) => LoadState::Ready(value.clone()),
                None => LoadState::NotRequested,
            },
            EntryStatus::Failed => {
                LoadState::Failed(entry.user_message().unwrap_or_default())
            }
        }
    }
}

impl From<NarrativeState> for LoadState<String> {
    fn from(state: NarrativeState) -> Self {
        match state {
            NarrativeState::NotGenerated => LoadState::NotRequested,
            NarrativeState::Generating => LoadState::Loading,
            NarrativeState::Ready(narrative) => LoadState::Ready(narrative.text),
            NarrativeState::Failed { message } => LoadState::Failed(message),
        }
    }
}

/// Everything a presentation layer needs to draw the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub selection: Selection,
    pub fingerprint: String,
    pub resolved: Option<ResolvedTuple>,
    pub companies: LoadState<Vec<CompanyId>>,
    pub products: LoadState<Vec<ProductId>>,
    pub snapshots: LoadState<Vec<Snapshot>>,
    pub product_config: LoadState<ProductConfig>,
    pub date_range: LoadState<DateRange>,
    pub currency_options: Vec<Currency>,
    pub active_tab: Tab,
    pub summary: LoadState<PortfolioSummary>,
    /// `None` on the Overview tab.
    pub chart: Option<LoadState<ChartPayload>>,
    pub commentary: LoadState<String>,
    /// `None` on the Overview tab.
    pub tab_insight: Option<LoadState<String>>,
    pub chat: Vec<ChatTurn>,
    pub chat_waiting: bool,
}

#[derive(Debug, Default)]
struct Preferred {
    company: Option<CompanyId>,
    product: Option<ProductId>,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ViewController<B> {
    backend: Arc<B>,
    params: ParameterStore,
    summaries: ResourceCache<ResolvedTuple, PortfolioSummary>,
    charts: ResourceCache<ChartKey, ChartPayload>,
    narratives: NarrativeCache,
    tabs: TabLoader<B>,
    chat: ChatTranscript,
    /// Failed option-list fetches, keyed by the level the list bounds.
    option_errors: HashMap<Level, FetchError>,
    preferred: Preferred,
    started: bool,
    tx: mpsc::UnboundedSender<ControllerEvent>,
    rx: mpsc::UnboundedReceiver<ControllerEvent>,
    in_flight: usize,
}

impl<B> ViewController<B>
where
    B: AnalyticsBackend + 'static,
{
    pub fn new(backend: Arc<B>, tab: Tab) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tabs: TabLoader::new(Arc::clone(&backend), tab),
            backend,
            params: ParameterStore::new(),
            summaries: ResourceCache::new("summary"),
            charts: ResourceCache::new("chart"),
            narratives: NarrativeCache::new(),
            chat: ChatTranscript::new(),
            option_errors: HashMap::new(),
            preferred: Preferred::default(),
            started: false,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Company to open once the company list arrives.
    pub fn with_default_company(mut self, company: Option<CompanyId>) -> Self {
        self.preferred.company = company;
        self
    }

    /// Apply persisted view state. Persisted choices are used only if they
    /// appear in the option lists when those arrive.
    pub fn restore(&mut self, state: &PersistedState) {
        self.tabs.activate(state.active_tab);
        if state.company.is_some() {
            self.preferred.company = state.company.clone();
            self.preferred.product = state.product.clone();
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        let selection = self.params.selection();
        PersistedState {
            active_tab: self.tabs.active(),
            company: selection.company.clone(),
            product: selection.product.clone(),
        }
    }

    /// Request the company list.
    pub fn start(&mut self) {
        self.started = true;
        self.fetch_companies();
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.params.fingerprint()
    }

    pub fn active_tab(&self) -> Tab {
        self.tabs.active()
    }

    pub fn summaries(&self) -> &ResourceCache<ResolvedTuple, PortfolioSummary> {
        &self.summaries
    }

    pub fn charts(&self) -> &ResourceCache<ChartKey, ChartPayload> {
        &self.charts
    }

    pub fn narratives(&self) -> &NarrativeCache {
        &self.narratives
    }

    pub fn chat(&self) -> &ChatTranscript {
        &self.chat
    }

    pub fn option_error(&self, level: Level) -> Option<&FetchError> {
        self.option_errors.get(&level)
    }

    /// Requests whose completion has not been handled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Stats of the summary, chart and narrative caches, in that order.
    pub fn cache_stats(&self) -> [(&'static str, CacheStats); 3] {
        [
            (self.summaries.name(), self.summaries.stats()),
            (self.charts.name(), self.charts.stats()),
            ("narrative", self.narratives.stats()),
        ]
    }

    // ========================================================================
    // USER ACTIONS
    // ========================================================================

    /// Set one selection level. Dependent caches are invalidated before any
    /// dependent fetch is issued.
    pub fn select(&mut self, choice: Choice) -> SelectOutcome {
        let outcome = self.params.select(choice);
        if let SelectOutcome::Applied(event) = &outcome {
            self.on_change(event);
        }
        outcome
    }

    /// Switch tabs, fetching the new tab's data if the selection is resolved.
    /// A failed summary or chart is retried on activation.
    pub fn activate_tab(&mut self, tab: Tab) {
        self.tabs.activate(tab);
        match tab.chart_tab() {
            Some(_) => self.load_active_chart(),
            None => self.load_summary(),
        }
    }

    pub fn request_commentary(&mut self) -> NarrativeState {
        self.generate(NarrativeKind::Commentary, false)
    }

    pub fn refresh_commentary(&mut self) -> NarrativeState {
        self.generate(NarrativeKind::Commentary, true)
    }

    /// Insight for the active tab. The Overview tab has none.
    pub fn request_tab_insight(&mut self) -> NarrativeState {
        match self.tabs.active().chart_tab() {
            Some(tab) => self.generate(NarrativeKind::TabInsight(tab), false),
            None => NarrativeState::NotGenerated,
        }
    }

    pub fn refresh_tab_insight(&mut self) -> NarrativeState {
        match self.tabs.active().chart_tab() {
            Some(tab) => self.generate(NarrativeKind::TabInsight(tab), true),
            None => NarrativeState::NotGenerated,
        }
    }

    /// Ask a question about the current selection. Returns whether a request
    /// was sent.
    pub fn ask(&mut self, question: &str) -> bool {
        let Some(tuple) = self.params.resolved() else {
            return false;
        };
        let Some(ticket) = self.chat.begin(question, tuple.fingerprint()) else {
            return false;
        };
        tracing::debug!(request_id = %ticket.request_id, "Sending chat question");
        let backend = Arc::clone(&self.backend);
        let aborted = ticket.clone();
        self.spawn(
            async move {
                let result = backend
                    .chat(&tuple, &ticket.question, &ticket.history)
                    .await;
                ControllerEvent::ChatReply { ticket, result }
            },
            move |error| ControllerEvent::ChatReply {
                ticket: aborted,
                result: Err(error),
            },
        );
        true
    }

    /// Re-request every option list whose last fetch failed.
    pub fn retry_failed_options(&mut self) {
        let failed: Vec<Level> = self.option_errors.drain().map(|(level, _)| level).collect();
        for level in failed {
            match level {
                Level::Company => self.fetch_companies(),
                Level::Product => self.fetch_products(),
                Level::Snapshot => self.fetch_snapshots(),
                Level::Currency => self.fetch_config(),
                Level::DateRange => self.fetch_date_range(),
                Level::AsOfDate => {}
            }
        }
    }

    /// Drop every cached result and the chat transcript.
    pub fn close(&mut self) {
        let removed = self.summaries.clear() + self.charts.clear() + self.narratives.clear();
        self.chat.clear();
        tracing::debug!(removed, "View closed");
    }

    // ========================================================================
    // EVENT LOOP
    // ========================================================================

    /// Next completed request, or `None` once nothing is in flight.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(event)
    }

    /// Handle completions until nothing is in flight, including requests
    /// issued while handling.
    pub async fn settle(&mut self) {
        while let Some(event) = self.next_event().await {
            self.handle(event);
        }
    }

    /// Apply one completion.
    pub fn handle(&mut self, event: ControllerEvent) {
        tracing::trace!(event = event.label(), "Handling completion");
        match event {
            ControllerEvent::Companies { result } => match result {
                Ok(companies) => {
                    self.option_errors.remove(&Level::Company);
                    self.params.set_companies(companies);
                    self.choose_company();
                }
                Err(error) => self.record_option_error(Level::Company, error),
            },
            ControllerEvent::Products { scope, result } => match result {
                Ok(products) => {
                    if self.params.set_products(scope, products) {
                        self.option_errors.remove(&Level::Product);
                        self.choose_product();
                    }
                }
                Err(error) => self.record_scoped_error(Level::Product, scope, error),
            },
            ControllerEvent::Snapshots { scope, result } => match result {
                Ok(snapshots) => {
                    if self.params.set_snapshots(scope, snapshots) {
                        self.option_errors.remove(&Level::Snapshot);
                        self.choose_snapshot();
                    }
                }
                Err(error) => self.record_scoped_error(Level::Snapshot, scope, error),
            },
            ControllerEvent::ProductConfig { scope, result } => match result {
                Ok(config) => {
                    if scope == self.params.fingerprint_through(Level::Product) {
                        self.option_errors.remove(&Level::Currency);
                    }
                    if let Some(change) = self.params.set_product_config(scope, config) {
                        self.on_change(&change);
                    }
                }
                Err(error) => self.record_scoped_error(Level::Currency, scope, error),
            },
            ControllerEvent::DateRange { scope, result } => match result {
                Ok(range) => {
                    if scope == self.params.fingerprint_through(Level::Snapshot) {
                        self.option_errors.remove(&Level::DateRange);
                    }
                    if let Some(change) = self.params.set_date_range(scope, range) {
                        self.on_change(&change);
                    }
                }
                Err(error) => self.record_scoped_error(Level::DateRange, scope, error),
            },
            ControllerEvent::Summary(settled) => {
                self.summaries.settle(settled, self.params.fingerprint());
            }
            ControllerEvent::Chart(settled) => {
                self.charts.settle(settled, self.params.fingerprint());
            }
            ControllerEvent::Narrative(settled) => {
                self.narratives.settle(settled, self.params.fingerprint());
            }
            ControllerEvent::ChatReply { ticket, result } => {
                self.chat.complete(&ticket, result, self.params.fingerprint());
            }
        }
    }

    // ========================================================================
    // VIEW
    // ========================================================================

    pub fn view(&self) -> ViewSnapshot {
        let fingerprint = self.params.fingerprint();
        let resolved = self.params.resolved();
        let selection = self.params.selection();
        let active_tab = self.tabs.active();

        let summary: LoadState<PortfolioSummary> = resolved
            .as_ref()
            .and_then(|tuple| self.summaries.lookup(tuple, fingerprint))
            .map(LoadState::from)
            .unwrap_or(LoadState::NotRequested);

        let chart: Option<LoadState<ChartPayload>> = active_tab.chart_tab().map(|_| {
            resolved
                .as_ref()
                .and_then(|tuple| self.tabs.entry(tuple, &self.charts))
                .map(LoadState::from)
                .unwrap_or(LoadState::NotRequested)
        });

        let narrative = |kind: NarrativeKind| -> LoadState<String> {
            match &resolved {
                Some(tuple) => {
                    let key = NarrativeKey::new(tuple.clone(), kind);
                    self.narratives.state(&key, fingerprint).into()
                }
                None => LoadState::NotRequested,
            }
        };
        let commentary = narrative(NarrativeKind::Commentary);
        let tab_insight = active_tab
            .chart_tab()
            .map(|tab| narrative(NarrativeKind::TabInsight(tab)));

        ViewSnapshot {
            selection: selection.clone(),
            fingerprint: fingerprint.to_hex(),
            companies: self.option_state(
                Level::Company,
                self.params.companies().map(<[CompanyId]>::to_vec),
                self.started,
            ),
            products: self.option_state(
                Level::Product,
                self.params.products().map(<[ProductId]>::to_vec),
                selection.company.is_some(),
            ),
            snapshots: self.option_state(
                Level::Snapshot,
                self.params.snapshots().map(<[Snapshot]>::to_vec),
                selection.product.is_some(),
            ),
            product_config: self.option_state(
                Level::Currency,
                self.params.product_config().cloned(),
                selection.product.is_some(),
            ),
            date_range: self.option_state(
                Level::DateRange,
                self.params.date_range(),
                selection.snapshot.is_some(),
            ),
            currency_options: self.params.currency_options().unwrap_or_default(),
            active_tab,
            summary,
            chart,
            commentary,
            tab_insight,
            chat: self.chat.turns().to_vec(),
            chat_waiting: self.chat.is_waiting(),
            resolved,
        }
    }

    fn option_state<T>(&self, level: Level, value: Option<T>, requested: bool) -> LoadState<T> {
        match (value, self.option_errors.get(&level)) {
            (Some(value), _) => LoadState::Ready(value),
            (None, Some(error)) => LoadState::Failed(error.user_message()),
            (None, None) if requested => LoadState::Loading,
            (None, None) => LoadState::NotRequested,
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn on_change(&mut self, event: &ChangeEvent) {
        let current = self.params.fingerprint();
        let removed = self.summaries.invalidate_stale(current)
            + self.charts.invalidate_stale(current)
            + self.narratives.invalidate_stale(current);
        self.chat.scope_to(current);
        self.option_errors
            .retain(|level, _| list_scope(*level).map_or(true, |scope| scope < event.level));
        tracing::debug!(
            level = %event.level,
            removed,
            fingerprint = %current.short(),
            "Applied selection change"
        );

        match event.level {
            Level::Company => self.fetch_products(),
            Level::Product => {
                self.fetch_snapshots();
                self.fetch_config();
            }
            Level::Snapshot => self.fetch_date_range(),
            Level::DateRange | Level::AsOfDate | Level::Currency => {}
        }
        self.load_resolved();
    }

    /// Fetch the summary and the active tab's chart once every level is set.
    fn load_resolved(&mut self) {
        self.load_summary();
        self.load_active_chart();
    }

    fn load_summary(&mut self) {
        let Some(tuple) = self.params.resolved() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let request = tuple.clone();
        let lookup = self.summaries.get(tuple.clone(), tuple.fingerprint(), move || {
            async move { backend.summary(&request).await }.boxed()
        });
        if let Some(fetch) = lookup.fetch {
            self.spawn_fetch(fetch, ControllerEvent::Summary);
        }
    }

    fn load_active_chart(&mut self) {
        let Some(tuple) = self.params.resolved() else {
            return;
        };
        let fetch = self
            .tabs
            .load(&tuple, &mut self.charts)
            .and_then(|lookup| lookup.fetch);
        if let Some(fetch) = fetch {
            self.spawn_fetch(fetch, ControllerEvent::Chart);
        }
    }

    fn generate(&mut self, kind: NarrativeKind, refresh: bool) -> NarrativeState {
        let Some(tuple) = self.params.resolved() else {
            return NarrativeState::NotGenerated;
        };
        let key = NarrativeKey::new(tuple.clone(), kind);
        let backend = Arc::clone(&self.backend);
        let generator = move || {
            async move {
                match kind {
                    NarrativeKind::Commentary => backend.commentary(&tuple).await,
                    NarrativeKind::TabInsight(tab) => backend.tab_insight(&tuple, tab).await,
                }
            }
            .boxed()
        };
        let lookup = if refresh {
            self.narratives.refresh(key, generator)
        } else {
            self.narratives.get_or_generate(key, generator)
        };
        if let Some(fetch) = lookup.fetch {
            self.spawn_fetch(fetch, ControllerEvent::Narrative);
        }
        lookup.state
    }

    fn fetch_companies(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.spawn(
            async move {
                ControllerEvent::Companies {
                    result: backend.companies().await,
                }
            },
            |error| ControllerEvent::Companies { result: Err(error) },
        );
    }

    fn fetch_products(&mut self) {
        let Some(company) = self.params.selection().company.clone() else {
            return;
        };
        let scope = self.params.fingerprint_through(Level::Company);
        let backend = Arc::clone(&self.backend);
        self.spawn(
            async move {
                ControllerEvent::Products {
                    scope,
                    result: backend.products(&company).await,
                }
            },
            move |error| ControllerEvent::Products {
                scope,
                result: Err(error),
            },
        );
    }

    fn fetch_snapshots(&mut self) {
        let selection = self.params.selection();
        let (Some(company), Some(product)) = (selection.company.clone(), selection.product.clone())
        else {
            return;
        };
        let scope = self.params.fingerprint_through(Level::Product);
        let backend = Arc::clone(&self.backend);
        self.spawn(
            async move {
                ControllerEvent::Snapshots {
                    scope,
                    result: backend.snapshots(&company, &product).await,
                }
            },
            move |error| ControllerEvent::Snapshots {
                scope,
                result: Err(error),
            },
        );
    }

    fn fetch_config(&mut self) {
        let selection = self.params.selection();
        let (Some(company), Some(product)) = (selection.company.clone(), selection.product.clone())
        else {
            return;
        };
        let scope = self.params.fingerprint_through(Level::Product);
        let backend = Arc::clone(&self.backend);
        self.spawn(
            async move {
                ControllerEvent::ProductConfig {
                    scope,
                    result: backend.product_config(&company, &product).await,
                }
            },
            move |error| ControllerEvent::ProductConfig {
                scope,
                result: Err(error),
            },
        );
    }

    fn fetch_date_range(&mut self) {
        let selection = self.params.selection();
        let (Some(company), Some(product), Some(snapshot)) = (
            selection.company.clone(),
            selection.product.clone(),
            selection.snapshot.clone(),
        ) else {
            return;
        };
        let scope = self.params.fingerprint_through(Level::Snapshot);
        let backend = Arc::clone(&self.backend);
        self.spawn(
            async move {
                ControllerEvent::DateRange {
                    scope,
                    result: backend.date_range(&company, &product, &snapshot).await,
                }
            },
            move |error| ControllerEvent::DateRange {
                scope,
                result: Err(error),
            },
        );
    }

    /// Run `task` and deliver its event. If the task panics or is cancelled,
    /// `on_abort` builds the event instead, so every spawned request reports
    /// back exactly once.
    fn spawn<F, A>(&mut self, task: F, on_abort: A)
    where
        F: Future<Output = ControllerEvent> + Send + 'static,
        A: FnOnce(FetchError) -> ControllerEvent + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let event = match handle.await {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!(error = %err, "Request task aborted");
                    on_abort(FetchError::backend("request did not complete"))
                }
            };
            let _ = tx.send(event);
        });
    }

    /// Drive a cache fetch. An aborted task settles the entry as failed.
    fn spawn_fetch<K, T>(
        &mut self,
        fetch: PendingFetch<K, T>,
        wrap: fn(Settled<K, T>) -> ControllerEvent,
    ) where
        K: Clone + Send + 'static,
        T: Send + 'static,
    {
        let ticket = fetch.ticket.clone();
        self.spawn(async move { wrap(fetch.run().await) }, move |error| {
            wrap(Settled {
                ticket,
                result: Err(error),
            })
        });
    }

    fn choose_company(&mut self) {
        if self.params.selection().company.is_some() {
            return;
        }
        let Some(company) = self.preferred.company.take() else {
            return;
        };
        if let SelectOutcome::Rejected(reason) = self.select(Choice::Company(company.clone())) {
            tracing::warn!(company = %company, ?reason, "Preferred company is not available");
            self.preferred.product = None;
        }
    }

    fn choose_product(&mut self) {
        if self.params.selection().product.is_some() {
            return;
        }
        let preferred = self
            .preferred
            .product
            .take()
            .filter(|p| self.params.products().is_some_and(|list| list.contains(p)));
        if let Some(product) = preferred.or_else(|| self.params.default_product()) {
            self.select(Choice::Product(product));
        }
    }

    fn choose_snapshot(&mut self) {
        if self.params.selection().snapshot.is_some() {
            return;
        }
        if let Some(snapshot) = self.params.default_snapshot() {
            self.select(Choice::Snapshot(snapshot));
        }
    }

    fn record_option_error(&mut self, level: Level, error: FetchError) {
        tracing::warn!(level = %level, error = %error, "Option list fetch failed");
        self.option_errors.insert(level, error);
    }

    /// Record a failure only if its scope is still current.
    fn record_scoped_error(&mut self, level: Level, scope: Fingerprint, error: FetchError) {
        let current = list_scope(level).map(|parent| self.params.fingerprint_through(parent));
        if current == Some(scope) {
            self.record_option_error(level, error);
        } else {
            tracing::debug!(level = %level, "Ignoring failure for superseded scope");
        }
    }
}

/// Level whose value scopes the option list bounding `level`. The product
/// configuration is filed under `Currency`.
fn list_scope(level: Level) -> Option<Level> {
    match level {
        Level::Company | Level::AsOfDate => None,
        Level::Product => Some(Level::Company),
        Level::Snapshot | Level::Currency => Some(Level::Product),
        Level::DateRange => Some(Level::Snapshot),
    }
}

impl<B> std::fmt::Debug for ViewController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewController")
            .field("params", &self.params)
            .field("summaries", &self.summaries)
            .field("charts", &self.charts)
            .field("narratives", &self.narratives)
            .field("tabs", &self.tabs)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditlens_test_utils::fixtures::{acme, date, loan_product};
    use creditlens_test_utils::{endpoint, MockBackend};

    async fn started(backend: MockBackend) -> (Arc<MockBackend>, ViewController<MockBackend>) {
        let backend = Arc::new(backend);
        let mut controller = ViewController::new(Arc::clone(&backend), Tab::Overview)
            .with_default_company(Some(acme()));
        controller.start();
        controller.settle().await;
        (backend, controller)
    }

    #[tokio::test]
    async fn test_start_resolves_defaults() {
        let (backend, controller) = started(MockBackend::acme()).await;
        let tuple = controller.params().resolved().unwrap();
        assert_eq!(tuple.product, loan_product());
        assert_eq!(tuple.snapshot.as_str(), "2024-02");
        assert_eq!(tuple.as_of_date, date(2024, 2, 29));
        assert_eq!(tuple.currency, Currency::new("AED"));
        assert_eq!(backend.requests(endpoint::SUMMARY), 1);
        assert!(controller.view().summary.is_ready());
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_without_default_company_waits_for_user() {
        let backend = Arc::new(MockBackend::acme());
        let mut controller = ViewController::new(Arc::clone(&backend), Tab::Overview);
        controller.start();
        controller.settle().await;
        let view = controller.view();
        assert_eq!(view.companies, LoadState::Ready(vec![acme()]));
        assert_eq!(view.products, LoadState::NotRequested);
        assert_eq!(backend.requests(endpoint::PRODUCTS), 0);
    }

    #[tokio::test]
    async fn test_option_failure_is_shown_and_retryable() {
        let backend = MockBackend::acme();
        backend.fail(endpoint::SNAPSHOTS, FetchError::network("down"));
        let (backend, mut controller) = started(backend).await;

        let view = controller.view();
        assert!(matches!(view.snapshots, LoadState::Failed(_)));
        assert!(controller.option_error(Level::Snapshot).is_some());
        assert!(view.resolved.is_none());

        backend.recover(endpoint::SNAPSHOTS);
        controller.retry_failed_options();
        controller.settle().await;
        assert!(controller.params().is_resolved());
        assert!(controller.option_error(Level::Snapshot).is_none());
    }

    #[tokio::test]
    async fn test_overview_tab_has_no_chart_or_insight() {
        let (backend, mut controller) = started(MockBackend::acme()).await;
        assert_eq!(controller.request_tab_insight(), NarrativeState::NotGenerated);
        let view = controller.view();
        assert!(view.chart.is_none());
        assert!(view.tab_insight.is_none());
        assert_eq!(backend.total_requests(), 6);
    }

    #[tokio::test]
    async fn test_close_drops_cached_results() {
        let (_, mut controller) = started(MockBackend::acme()).await;
        controller.request_commentary();
        controller.settle().await;
        controller.close();
        assert!(controller.summaries().is_empty());
        assert!(controller.narratives().is_empty());
        assert_eq!(controller.view().commentary, LoadState::NotRequested);
    }

    #[tokio::test]
    async fn test_persisted_state_round_trips_selection() {
        let (_, mut controller) = started(MockBackend::acme()).await;
        controller.activate_tab(Tab::Revenue);
        let state = controller.persisted_state();
        assert_eq!(state.active_tab, Tab::Revenue);
        assert_eq!(state.company, Some(acme()));
        assert_eq!(state.product, Some(loan_product()));
    }
}
