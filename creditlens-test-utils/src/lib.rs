//! CreditLens Test Utilities
//!
//! Centralized test infrastructure for the CreditLens workspace:
//! - An in-memory analytics backend with request counters and failure injection
//! - Proptest generators for selection and entity types
//! - Test fixtures for common scenarios
//! - Custom assertions for fetch results

pub use creditlens_core::{
    AnalyticsBackend, ChartPayload, ChartTab, ChatRole, ChatTurn, CompanyId, Currency,
    DateRange, ErrorKind, FetchError, FetchResult, PortfolioSummary, ProductConfig, ProductId,
    ResolvedTuple, Snapshot, SnapshotId,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// Endpoint labels used by [`MockBackend`] counters and failure injection.
pub mod endpoint {
    use super::ChartTab;

    pub const COMPANIES: &str = "companies";
    pub const PRODUCTS: &str = "products";
    pub const SNAPSHOTS: &str = "snapshots";
    pub const CONFIG: &str = "config";
    pub const DATE_RANGE: &str = "date-range";
    pub const SUMMARY: &str = "summary";
    pub const COMMENTARY: &str = "ai-commentary";
    pub const CHAT: &str = "chat";

    pub fn chart(tab: ChartTab) -> String {
        format!("charts/{}", tab.slug())
    }

    pub fn insight(tab: ChartTab) -> String {
        format!("ai-tab-insight/{}", tab.slug())
    }
}

type ProductKey = (CompanyId, ProductId);
type SnapshotKey = (CompanyId, ProductId, SnapshotId);

/// In-memory analytics backend.
///
/// Counts every request per endpoint label and fails any endpoint on demand.
/// Commentary text is numbered per request (`T1`, `T2`, ...) so tests can
/// tell a regenerated narrative from a cached one.
#[derive(Debug, Default)]
pub struct MockBackend {
    companies: Vec<CompanyId>,
    products: HashMap<CompanyId, Vec<ProductId>>,
    snapshots: HashMap<ProductKey, Vec<Snapshot>>,
    configs: HashMap<ProductKey, ProductConfig>,
    ranges: HashMap<SnapshotKey, DateRange>,
    requests: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, FetchError>>,
    crashes: Mutex<HashSet<String>>,
    chat_histories: Mutex<Vec<Vec<ChatTurn>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// One company (`acme`) with one AED product (`loan_product`) and two
    /// tapes, `2024-01` (as of 2023-07-01..2024-01-31) and `2024-02`
    /// (as of 2023-07-01..2024-02-29).
    pub fn acme() -> Self {
        let acme = fixtures::acme();
        let product = fixtures::loan_product();
        Self::new()
            .with_product(acme.clone(), product.clone(), fixtures::aed_config())
            .with_snapshot(
                acme.clone(),
                product.clone(),
                fixtures::snapshot("2024-01", fixtures::date(2024, 1, 31)),
                fixtures::range(fixtures::date(2023, 7, 1), fixtures::date(2024, 1, 31)),
            )
            .with_snapshot(
                acme,
                product,
                fixtures::snapshot("2024-02", fixtures::date(2024, 2, 29)),
                fixtures::range(fixtures::date(2023, 7, 1), fixtures::date(2024, 2, 29)),
            )
    }

    pub fn with_product(
        mut self,
        company: CompanyId,
        product: ProductId,
        config: ProductConfig,
    ) -> Self {
        if !self.companies.contains(&company) {
            self.companies.push(company.clone());
        }
        let products = self.products.entry(company.clone()).or_default();
        if !products.contains(&product) {
            products.push(product.clone());
        }
        self.configs.insert((company, product), config);
        self
    }

    /// Append a tape (tapes are listed oldest first).
    pub fn with_snapshot(
        mut self,
        company: CompanyId,
        product: ProductId,
        snapshot: Snapshot,
        range: DateRange,
    ) -> Self {
        self.ranges.insert(
            (company.clone(), product.clone(), snapshot.id.clone()),
            range,
        );
        self.snapshots
            .entry((company, product))
            .or_default()
            .push(snapshot);
        self
    }

    /// Override the as-of range of an existing tape.
    pub fn with_date_range(
        mut self,
        company: CompanyId,
        product: ProductId,
        snapshot: SnapshotId,
        range: DateRange,
    ) -> Self {
        self.ranges.insert((company, product, snapshot), range);
        self
    }

    /// Make every request to `endpoint` fail with `error` until [`recover`](Self::recover).
    pub fn fail(&self, endpoint: impl Into<String>, error: FetchError) {
        lock(&self.failures).insert(endpoint.into(), error);
    }

    /// Make every request to `endpoint` panic until [`recover`](Self::recover).
    pub fn crash(&self, endpoint: impl Into<String>) {
        lock(&self.crashes).insert(endpoint.into());
    }

    pub fn recover(&self, endpoint: &str) {
        lock(&self.failures).remove(endpoint);
        lock(&self.crashes).remove(endpoint);
    }

    /// Requests received by `endpoint` so far.
    pub fn requests(&self, endpoint: &str) -> usize {
        lock(&self.requests).get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        lock(&self.requests).values().sum()
    }

    /// History sent with each chat request, in order.
    pub fn chat_histories(&self) -> Vec<Vec<ChatTurn>> {
        lock(&self.chat_histories).clone()
    }

    /// Count the request and return its sequence number, or the injected failure.
    fn record(&self, endpoint: &str) -> FetchResult<usize> {
        let count = {
            let mut requests = lock(&self.requests);
            let count = requests.entry(endpoint.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let crashing = lock(&self.crashes).contains(endpoint);
        if crashing {
            panic!("mock backend crashed on {}", endpoint);
        }
        match lock(&self.failures).get(endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(count),
        }
    }

    fn product_key(&self, company: &CompanyId, product: &ProductId) -> FetchResult<ProductKey> {
        let known = self
            .products
            .get(company)
            .map(|products| products.contains(product))
            .unwrap_or(false);
        if known {
            Ok((company.clone(), product.clone()))
        } else {
            Err(FetchError::backend(format!(
                "HTTP 404: no product {} for {}",
                product, company
            )))
        }
    }
}

#[async_trait]
impl AnalyticsBackend for MockBackend {
    async fn companies(&self) -> FetchResult<Vec<CompanyId>> {
        self.record(endpoint::COMPANIES)?;
        if self.companies.is_empty() {
            return Err(FetchError::empty("companies"));
        }
        Ok(self.companies.clone())
    }

    async fn products(&self, company: &CompanyId) -> FetchResult<Vec<ProductId>> {
        self.record(endpoint::PRODUCTS)?;
        match self.products.get(company) {
            Some(products) if !products.is_empty() => Ok(products.clone()),
            _ => Err(FetchError::empty("products")),
        }
    }

    async fn snapshots(
        &self,
        company: &CompanyId,
        product: &ProductId,
    ) -> FetchResult<Vec<Snapshot>> {
        self.record(endpoint::SNAPSHOTS)?;
        let key = self.product_key(company, product)?;
        match self.snapshots.get(&key) {
            Some(snapshots) if !snapshots.is_empty() => Ok(snapshots.clone()),
            _ => Err(FetchError::empty("snapshots")),
        }
    }

    async fn product_config(
        &self,
        company: &CompanyId,
        product: &ProductId,
    ) -> FetchResult<ProductConfig> {
        self.record(endpoint::CONFIG)?;
        let key = self.product_key(company, product)?;
        Ok(self.configs.get(&key).cloned().unwrap_or(ProductConfig {
            currency: Currency::usd(),
            description: String::new(),
            configured: false,
        }))
    }

    async fn date_range(
        &self,
        company: &CompanyId,
        product: &ProductId,
        snapshot: &SnapshotId,
    ) -> FetchResult<DateRange> {
        self.record(endpoint::DATE_RANGE)?;
        let key = (company.clone(), product.clone(), snapshot.clone());
        self.ranges
            .get(&key)
            .copied()
            .ok_or_else(|| FetchError::backend("HTTP 404: No snapshots found"))
    }

    async fn summary(&self, tuple: &ResolvedTuple) -> FetchResult<PortfolioSummary> {
        self.record(endpoint::SUMMARY)?;
        self.product_key(&tuple.company, &tuple.product)?;
        Ok(PortfolioSummary {
            snapshot_date: Some(tuple.snapshot.to_string()),
            as_of_date: Some(creditlens_core::format_date(tuple.as_of_date)),
            display_currency: Some(tuple.currency.clone()),
            total_deals: 120,
            total_purchase_value: 1_000_000.0,
            total_collected: 820_000.0,
            collection_rate: 82.0,
            ..Default::default()
        })
    }

    async fn chart(&self, tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<ChartPayload> {
        let n = self.record(&endpoint::chart(tab))?;
        Ok(ChartPayload(serde_json::json!({
            "tab": tab.slug(),
            "currency": tuple.currency.as_str(),
            "as_of_date": creditlens_core::format_date(tuple.as_of_date),
            "request": n,
            "data": [],
        })))
    }

    async fn commentary(&self, _tuple: &ResolvedTuple) -> FetchResult<String> {
        let n = self.record(endpoint::COMMENTARY)?;
        Ok(format!("T{}", n))
    }

    async fn tab_insight(&self, _tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<String> {
        let n = self.record(&endpoint::insight(tab))?;
        Ok(format!("{} insight {}", tab.slug(), n))
    }

    async fn chat(
        &self,
        _tuple: &ResolvedTuple,
        question: &str,
        history: &[ChatTurn],
    ) -> FetchResult<String> {
        lock(&self.chat_histories).push(history.to_vec());
        let n = self.record(endpoint::CHAT)?;
        Ok(format!("Answer {}: {}", n, question))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for CreditLens selection types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_company_id() -> impl Strategy<Value = CompanyId> {
        "[a-z][a-z0-9_]{0,11}".prop_map(CompanyId::new)
    }

    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        "[a-z][a-z0-9_]{0,15}".prop_map(ProductId::new)
    }

    pub fn arb_snapshot_id() -> impl Strategy<Value = SnapshotId> {
        arb_date().prop_map(|d| SnapshotId::new(creditlens_core::format_date(d)))
    }

    pub fn arb_currency() -> impl Strategy<Value = Currency> {
        prop_oneof![
            Just(Currency::new("AED")),
            Just(Currency::new("USD")),
            Just(Currency::new("EUR")),
            Just(Currency::new("GBP")),
            Just(Currency::new("SAR")),
            Just(Currency::new("KWD")),
        ]
    }

    /// Dates between 2020-01-01 and roughly 2029.
    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (0i64..3650).prop_map(|offset| fixtures::date(2020, 1, 1) + chrono::Duration::days(offset))
    }

    pub fn arb_date_range() -> impl Strategy<Value = DateRange> {
        (arb_date(), 0i64..730).prop_map(|(min, span)| DateRange {
            min,
            max: min + chrono::Duration::days(span),
        })
    }

    pub fn arb_chart_tab() -> impl Strategy<Value = ChartTab> {
        prop::sample::select(ChartTab::all().to_vec())
    }

    pub fn arb_resolved_tuple() -> impl Strategy<Value = ResolvedTuple> {
        (
            arb_company_id(),
            arb_product_id(),
            arb_snapshot_id(),
            arb_date(),
            arb_currency(),
        )
            .prop_map(|(company, product, snapshot, as_of_date, currency)| ResolvedTuple {
                company,
                product,
                snapshot,
                as_of_date,
                currency,
            })
    }

    pub fn arb_chat_turn() -> impl Strategy<Value = ChatTurn> {
        (any::<bool>(), "[a-zA-Z ?]{1,40}", any::<bool>()).prop_map(|(user, content, failed)| {
            if user {
                ChatTurn::user(content)
            } else if failed {
                ChatTurn::error(content)
            } else {
                ChatTurn::assistant(content)
            }
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Build a date, panicking on an invalid one.
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(d) => d,
            None => panic!("invalid fixture date {}-{}-{}", year, month, day),
        }
    }

    pub fn range(min: NaiveDate, max: NaiveDate) -> DateRange {
        DateRange { min, max }
    }

    pub fn acme() -> CompanyId {
        CompanyId::new("acme")
    }

    pub fn loan_product() -> ProductId {
        ProductId::new("loan_product")
    }

    pub fn aed_config() -> ProductConfig {
        ProductConfig {
            currency: Currency::new("AED"),
            description: "Receivables financing".to_string(),
            configured: true,
        }
    }

    pub fn snapshot(id: &str, date: NaiveDate) -> Snapshot {
        Snapshot {
            id: SnapshotId::new(id),
            date: Some(date),
            filename: format!("{}_loan_tape.csv", id),
        }
    }

    /// (acme, loan_product, 2024-01, 2024-01-31, AED)
    pub fn acme_tuple() -> ResolvedTuple {
        ResolvedTuple {
            company: acme(),
            product: loan_product(),
            snapshot: SnapshotId::new("2024-01"),
            as_of_date: date(2024, 1, 31),
            currency: Currency::new("AED"),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for fetch results.

    use super::*;

    /// Assert that a fetch failed with the given kind.
    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &FetchResult<T>, kind: ErrorKind) {
        match result {
            Err(error) => assert_eq!(error.kind, kind, "Wrong error kind: {}", error),
            Ok(value) => panic!("Expected {} error, got Ok: {:?}", kind, value),
        }
    }

    /// Assert that a fetch succeeded.
    #[track_caller]
    pub fn assert_fetched<T: std::fmt::Debug>(result: &FetchResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a backend endpoint was hit exactly `expected` times.
    #[track_caller]
    pub fn assert_requests(backend: &MockBackend, endpoint: &str, expected: usize) {
        let actual = backend.requests(endpoint);
        assert_eq!(
            actual, expected,
            "Expected {} request(s) to {}, got {}",
            expected, endpoint, actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertions::*;

    #[tokio::test]
    async fn test_commentary_is_numbered_per_request() {
        let backend = MockBackend::acme();
        let tuple = fixtures::acme_tuple();
        assert_eq!(backend.commentary(&tuple).await.unwrap(), "T1");
        assert_eq!(backend.commentary(&tuple).await.unwrap(), "T2");
        assert_requests(&backend, endpoint::COMMENTARY, 2);
    }

    #[tokio::test]
    async fn test_failure_injection_counts_request() {
        let backend = MockBackend::acme();
        backend.fail(endpoint::SNAPSHOTS, FetchError::network("down"));
        let result = backend.snapshots(&fixtures::acme(), &fixtures::loan_product()).await;
        assert_fetch_error(&result, ErrorKind::NetworkFailure);
        assert_requests(&backend, endpoint::SNAPSHOTS, 1);

        backend.recover(endpoint::SNAPSHOTS);
        let result = backend.snapshots(&fixtures::acme(), &fixtures::loan_product()).await;
        assert_fetched(&result);
    }

    #[tokio::test]
    async fn test_unknown_company_has_no_products() {
        let backend = MockBackend::acme();
        let result = backend.products(&CompanyId::new("nope")).await;
        assert_fetch_error(&result, ErrorKind::EmptyResult);
    }
}
