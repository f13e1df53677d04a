//! Cascading parameter store.
//!
//! Holds the current value of every selection level together with the
//! option lists that bound each level. Selecting a level clears everything
//! below it, except that the display currency survives snapshot and as-of
//! changes within the same product.

use chrono::NaiveDate;
use creditlens_core::{
    format_date, Choice, CompanyId, Currency, DateRange, Fingerprint, Level, ProductConfig,
    ProductId, ResolvedTuple, Selection, Snapshot, SnapshotId,
};
use tokio::sync::watch;

/// Emitted whenever the selection changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Level that was set directly.
    pub level: Level,
    pub previous: Fingerprint,
    pub fingerprint: Fingerprint,
    /// Levels that lost their value as a consequence.
    pub cleared: Vec<Level>,
}

/// Why a selection was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The option list for the level has not been loaded for the current scope.
    OptionsUnknown,
    /// The value is not among the loaded options.
    NotAllowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Applied(ChangeEvent),
    /// The level already held this value.
    Unchanged,
    Rejected(RejectReason),
}

impl SelectOutcome {
    pub fn change(&self) -> Option<&ChangeEvent> {
        match self {
            SelectOutcome::Applied(event) => Some(event),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ParameterStore {
    selection: Selection,
    companies: Option<Vec<CompanyId>>,
    products: Option<Vec<ProductId>>,
    snapshots: Option<Vec<Snapshot>>,
    config: Option<ProductConfig>,
    date_range: Option<DateRange>,
    changes: watch::Sender<Fingerprint>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        let selection = Selection::new();
        let (changes, _) = watch::channel(selection.fingerprint());
        Self {
            selection,
            companies: None,
            products: None,
            snapshots: None,
            config: None,
            date_range: None,
            changes,
        }
    }

    /// Receive the fingerprint after every change.
    pub fn subscribe(&self) -> watch::Receiver<Fingerprint> {
        self.changes.subscribe()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.selection.fingerprint()
    }

    pub fn fingerprint_through(&self, level: Level) -> Fingerprint {
        self.selection.fingerprint_through(level)
    }

    pub fn resolved(&self) -> Option<ResolvedTuple> {
        self.selection.resolved()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved().is_some()
    }

    pub fn companies(&self) -> Option<&[CompanyId]> {
        self.companies.as_deref()
    }

    pub fn products(&self) -> Option<&[ProductId]> {
        self.products.as_deref()
    }

    pub fn snapshots(&self) -> Option<&[Snapshot]> {
        self.snapshots.as_deref()
    }

    pub fn product_config(&self) -> Option<&ProductConfig> {
        self.config.as_ref()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn currency_options(&self) -> Option<Vec<Currency>> {
        self.config.as_ref().map(ProductConfig::currency_options)
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    /// Set one level. Levels below it are cleared; the currency is kept when
    /// only the snapshot or as-of date changes.
    pub fn select(&mut self, choice: Choice) -> SelectOutcome {
        if self.selection.holds(&choice) {
            return SelectOutcome::Unchanged;
        }
        if let Err(reason) = self.check_allowed(&choice) {
            tracing::debug!(choice = %choice, ?reason, "Selection rejected");
            return SelectOutcome::Rejected(reason);
        }

        let level = choice.level();
        let previous = self.fingerprint();
        let mut cleared = Vec::new();
        for below in level.below() {
            if below == Level::Currency && level >= Level::Snapshot {
                continue;
            }
            if self.selection.is_set(below) && below.is_selectable() {
                cleared.push(below);
            }
            self.selection.clear(below);
        }
        self.drop_options_below(level);
        self.selection.apply(choice);

        let event = ChangeEvent {
            level,
            previous,
            fingerprint: self.fingerprint(),
            cleared,
        };
        tracing::info!(
            level = %level,
            fingerprint = %event.fingerprint.short(),
            cleared = ?event.cleared,
            "Selection changed"
        );
        self.changes.send_replace(event.fingerprint);
        SelectOutcome::Applied(event)
    }

    fn check_allowed(&self, choice: &Choice) -> Result<(), RejectReason> {
        let allowed = match choice {
            Choice::Company(company) => self.companies.as_ref().map(|c| c.contains(company)),
            Choice::Product(product) => self.products.as_ref().map(|p| p.contains(product)),
            Choice::Snapshot(snapshot) => self
                .snapshots
                .as_ref()
                .map(|s| s.iter().any(|known| &known.id == snapshot)),
            Choice::AsOfDate(date) => self.date_range.map(|range| range.contains(*date)),
            Choice::Currency(currency) => self
                .currency_options()
                .map(|options| options.contains(currency)),
        };
        match allowed {
            None => Err(RejectReason::OptionsUnknown),
            Some(false) => Err(RejectReason::NotAllowed),
            Some(true) => Ok(()),
        }
    }

    fn drop_options_below(&mut self, level: Level) {
        if level < Level::Product {
            self.products = None;
        }
        if level < Level::Snapshot {
            self.snapshots = None;
            self.config = None;
        }
        if level < Level::DateRange {
            self.date_range = None;
        }
    }

    // ========================================================================
    // OPTION LISTS
    // ========================================================================
    //
    // Each setter takes the scope fingerprint captured when the list was
    // requested and ignores the list if the scope has since changed.

    fn scope_matches(&self, level: Level, scope: Fingerprint) -> bool {
        let current = self.fingerprint_through(level);
        if current != scope {
            tracing::debug!(
                level = %level,
                scope = %scope.short(),
                current = %current.short(),
                "Ignoring options for superseded scope"
            );
            return false;
        }
        true
    }

    pub fn set_companies(&mut self, companies: Vec<CompanyId>) {
        if let Some(company) = &self.selection.company {
            if !companies.contains(company) {
                tracing::warn!(company = %company, "Selected company no longer listed");
            }
        }
        self.companies = Some(companies);
    }

    /// Products of the selected company.
    pub fn set_products(&mut self, scope: Fingerprint, products: Vec<ProductId>) -> bool {
        if self.selection.company.is_none() || !self.scope_matches(Level::Company, scope) {
            return false;
        }
        self.products = Some(products);
        true
    }

    /// Snapshots of the selected company and product, oldest first.
    pub fn set_snapshots(&mut self, scope: Fingerprint, snapshots: Vec<Snapshot>) -> bool {
        if self.selection.product.is_none() || !self.scope_matches(Level::Product, scope) {
            return false;
        }
        self.snapshots = Some(snapshots);
        true
    }

    /// Record the product configuration. Sets the currency to the reporting
    /// currency when none is selected, or when the selected one is not offered.
    pub fn set_product_config(
        &mut self,
        scope: Fingerprint,
        config: ProductConfig,
    ) -> Option<ChangeEvent> {
        if self.selection.product.is_none() || !self.scope_matches(Level::Product, scope) {
            return None;
        }
        let default = config.currency.clone();
        let options = config.currency_options();
        self.config = Some(config);

        match &self.selection.currency {
            Some(current) if options.contains(current) => None,
            _ => self.select(Choice::Currency(default)).change().cloned(),
        }
    }

    /// Record the as-of range of the selected snapshot and move the as-of
    /// date to its end.
    pub fn set_date_range(&mut self, scope: Fingerprint, range: DateRange) -> Option<ChangeEvent> {
        if self.selection.snapshot.is_none() || !self.scope_matches(Level::Snapshot, scope) {
            return None;
        }
        self.date_range = Some(range);
        tracing::debug!(
            min = %format_date(range.min),
            max = %format_date(range.max),
            "Date range derived"
        );
        self.select(Choice::AsOfDate(range.max)).change().cloned()
    }

    // ========================================================================
    // DEFAULTS
    // ========================================================================

    /// The first listed product, as the product picker defaults to.
    pub fn default_product(&self) -> Option<ProductId> {
        self.products.as_ref().and_then(|p| p.first().cloned())
    }

    /// The latest snapshot, as the snapshot picker defaults to.
    pub fn default_snapshot(&self) -> Option<SnapshotId> {
        self.snapshots
            .as_ref()
            .and_then(|s| s.last())
            .map(|s| s.id.clone())
    }

    pub fn default_as_of_date(&self) -> Option<NaiveDate> {
        self.date_range.map(|range| range.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditlens_test_utils::fixtures::{acme, aed_config, date, loan_product, range, snapshot};

    /// Store resolved to (acme, loan_product, 2024-01, 2024-01-31, AED).
    fn resolved_store() -> ParameterStore {
        let mut store = ParameterStore::new();
        store.set_companies(vec![acme()]);
        store.select(Choice::Company(acme()));
        let scope = store.fingerprint_through(Level::Company);
        assert!(store.set_products(scope, vec![loan_product()]));
        store.select(Choice::Product(loan_product()));
        let scope = store.fingerprint_through(Level::Product);
        store.set_snapshots(
            scope,
            vec![
                snapshot("2024-01", date(2024, 1, 31)),
                snapshot("2024-02", date(2024, 2, 29)),
            ],
        );
        store.set_product_config(scope, aed_config());
        store.select(Choice::Snapshot(SnapshotId::new("2024-01")));
        let scope = store.fingerprint_through(Level::Snapshot);
        store.set_date_range(scope, range(date(2023, 7, 1), date(2024, 1, 31)));
        store
    }

    #[test]
    fn test_resolves_with_defaults() {
        let store = resolved_store();
        let tuple = store.resolved().unwrap();
        assert_eq!(tuple.as_of_date, date(2024, 1, 31));
        assert_eq!(tuple.currency, Currency::new("AED"));
        assert_eq!(store.default_snapshot(), Some(SnapshotId::new("2024-02")));
    }

    #[test]
    fn test_unknown_options_reject() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.select(Choice::Company(acme())),
            SelectOutcome::Rejected(RejectReason::OptionsUnknown)
        );
        store.set_companies(vec![acme()]);
        assert_eq!(
            store.select(Choice::Company(CompanyId::new("globex"))),
            SelectOutcome::Rejected(RejectReason::NotAllowed)
        );
    }

    #[test]
    fn test_reselecting_is_unchanged() {
        let mut store = resolved_store();
        let before = store.fingerprint();
        assert_eq!(
            store.select(Choice::Currency(Currency::new("AED"))),
            SelectOutcome::Unchanged
        );
        assert_eq!(store.fingerprint(), before);
    }

    #[test]
    fn test_snapshot_change_keeps_currency_and_resets_as_of() {
        let mut store = resolved_store();
        store.select(Choice::Currency(Currency::usd()));

        let outcome = store.select(Choice::Snapshot(SnapshotId::new("2024-02")));
        let event = outcome.change().unwrap();
        assert_eq!(event.cleared, vec![Level::AsOfDate]);
        assert!(!store.is_resolved());
        assert_eq!(store.selection().currency, Some(Currency::usd()));

        let scope = store.fingerprint_through(Level::Snapshot);
        store.set_date_range(scope, range(date(2023, 7, 1), date(2024, 2, 29)));
        let tuple = store.resolved().unwrap();
        assert_eq!(tuple.as_of_date, date(2024, 2, 29));
        assert_eq!(tuple.currency, Currency::usd());
    }

    #[test]
    fn test_company_change_clears_everything_below() {
        let mut store = resolved_store();
        store.set_companies(vec![acme(), CompanyId::new("globex")]);
        let outcome = store.select(Choice::Company(CompanyId::new("globex")));
        let event = outcome.change().unwrap();
        assert_eq!(
            event.cleared,
            vec![Level::Product, Level::Snapshot, Level::AsOfDate, Level::Currency]
        );
        assert!(store.products().is_none());
        assert!(store.snapshots().is_none());
        assert!(store.product_config().is_none());
        assert!(store.date_range().is_none());
    }

    #[test]
    fn test_as_of_date_must_be_in_range() {
        let mut store = resolved_store();
        assert_eq!(
            store.select(Choice::AsOfDate(date(2024, 2, 1))),
            SelectOutcome::Rejected(RejectReason::NotAllowed)
        );
        assert!(store.select(Choice::AsOfDate(date(2023, 12, 31))).change().is_some());
    }

    #[test]
    fn test_stale_option_lists_are_ignored() {
        let mut store = ParameterStore::new();
        store.set_companies(vec![acme(), CompanyId::new("globex")]);
        store.select(Choice::Company(acme()));
        let acme_scope = store.fingerprint_through(Level::Company);
        store.select(Choice::Company(CompanyId::new("globex")));
        assert!(!store.set_products(acme_scope, vec![loan_product()]));
        assert!(store.products().is_none());
    }

    #[test]
    fn test_config_replaces_unoffered_currency() {
        let mut store = resolved_store();
        let scope = store.fingerprint_through(Level::Product);
        let event = store.set_product_config(
            scope,
            ProductConfig {
                currency: Currency::new("SAR"),
                ..aed_config()
            },
        );
        assert_eq!(event.map(|e| e.level), Some(Level::Currency));
        assert_eq!(store.selection().currency, Some(Currency::new("SAR")));
        assert_eq!(
            store.currency_options(),
            Some(vec![Currency::new("SAR"), Currency::usd()])
        );
    }

    #[test]
    fn test_watch_channel_tracks_fingerprint() {
        let mut store = resolved_store();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), store.fingerprint());
        store.select(Choice::Currency(Currency::usd()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), store.fingerprint());
    }
}
