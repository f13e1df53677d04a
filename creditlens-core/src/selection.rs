//! Selection levels, partial selections and the resolved parameter tuple

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::identity::{CompanyId, Currency, Fingerprint, ProductId, SnapshotId};

/// Date format used on the wire and inside fingerprints.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| CoreError::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ============================================================================
// LEVELS
// ============================================================================

/// Selection levels in dependency order. Earlier levels are "upstream".
///
/// `DateRange` is derived from the snapshot and never selected directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Company,
    Product,
    Snapshot,
    DateRange,
    AsOfDate,
    Currency,
}

impl Level {
    pub fn all() -> &'static [Level] {
        &[
            Level::Company,
            Level::Product,
            Level::Snapshot,
            Level::DateRange,
            Level::AsOfDate,
            Level::Currency,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Level::Company => "company",
            Level::Product => "product",
            Level::Snapshot => "snapshot",
            Level::DateRange => "date_range",
            Level::AsOfDate => "as_of_date",
            Level::Currency => "currency",
        }
    }

    /// Levels strictly below this one.
    pub fn below(&self) -> impl Iterator<Item = Level> + '_ {
        Self::all().iter().copied().filter(move |l| l > self)
    }

    /// Whether the level holds a user choice rather than a derived value.
    pub fn is_selectable(&self) -> bool {
        !matches!(self, Level::DateRange)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value for one selectable level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    Company(CompanyId),
    Product(ProductId),
    Snapshot(SnapshotId),
    AsOfDate(NaiveDate),
    Currency(Currency),
}

impl Choice {
    pub fn level(&self) -> Level {
        match self {
            Choice::Company(_) => Level::Company,
            Choice::Product(_) => Level::Product,
            Choice::Snapshot(_) => Level::Snapshot,
            Choice::AsOfDate(_) => Level::AsOfDate,
            Choice::Currency(_) => Level::Currency,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Company(v) => write!(f, "company={}", v),
            Choice::Product(v) => write!(f, "product={}", v),
            Choice::Snapshot(v) => write!(f, "snapshot={}", v),
            Choice::AsOfDate(v) => write!(f, "as_of_date={}", format_date(*v)),
            Choice::Currency(v) => write!(f, "currency={}", v),
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// The current value of every selectable level, any of which may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub company: Option<CompanyId>,
    pub product: Option<ProductId>,
    pub snapshot: Option<SnapshotId>,
    pub as_of_date: Option<NaiveDate>,
    pub currency: Option<Currency>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical string value of a level, `None` when unset or derived.
    pub fn value_at(&self, level: Level) -> Option<String> {
        match level {
            Level::Company => self.company.as_ref().map(|v| v.to_string()),
            Level::Product => self.product.as_ref().map(|v| v.to_string()),
            Level::Snapshot => self.snapshot.as_ref().map(|v| v.to_string()),
            Level::DateRange => None,
            Level::AsOfDate => self.as_of_date.map(format_date),
            Level::Currency => self.currency.as_ref().map(|v| v.to_string()),
        }
    }

    pub fn is_set(&self, level: Level) -> bool {
        match level {
            Level::Company => self.company.is_some(),
            Level::Product => self.product.is_some(),
            Level::Snapshot => self.snapshot.is_some(),
            // Resolved once the as-of date is auto-selected from it.
            Level::DateRange => self.as_of_date.is_some(),
            Level::AsOfDate => self.as_of_date.is_some(),
            Level::Currency => self.currency.is_some(),
        }
    }

    /// Whether `choice` equals the value currently held by its level.
    pub fn holds(&self, choice: &Choice) -> bool {
        match choice {
            Choice::Company(v) => self.company.as_ref() == Some(v),
            Choice::Product(v) => self.product.as_ref() == Some(v),
            Choice::Snapshot(v) => self.snapshot.as_ref() == Some(v),
            Choice::AsOfDate(v) => self.as_of_date.as_ref() == Some(v),
            Choice::Currency(v) => self.currency.as_ref() == Some(v),
        }
    }

    pub fn apply(&mut self, choice: Choice) {
        match choice {
            Choice::Company(v) => self.company = Some(v),
            Choice::Product(v) => self.product = Some(v),
            Choice::Snapshot(v) => self.snapshot = Some(v),
            Choice::AsOfDate(v) => self.as_of_date = Some(v),
            Choice::Currency(v) => self.currency = Some(v),
        }
    }

    pub fn clear(&mut self, level: Level) {
        match level {
            Level::Company => self.company = None,
            Level::Product => self.product = None,
            Level::Snapshot => self.snapshot = None,
            Level::DateRange => {}
            Level::AsOfDate => self.as_of_date = None,
            Level::Currency => self.currency = None,
        }
    }

    /// Fingerprint of every level.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint_through(Level::Currency)
    }

    /// Fingerprint of the levels up to and including `level`.
    pub fn fingerprint_through(&self, level: Level) -> Fingerprint {
        let values: Vec<Option<String>> = Level::all()
            .iter()
            .filter(|l| l.is_selectable() && **l <= level)
            .map(|l| self.value_at(*l))
            .collect();
        Fingerprint::of(values.iter().map(|v| v.as_deref()))
    }

    /// The full tuple, when every selectable level is set.
    pub fn resolved(&self) -> Option<ResolvedTuple> {
        Some(ResolvedTuple {
            company: self.company.clone()?,
            product: self.product.clone()?,
            snapshot: self.snapshot.clone()?,
            as_of_date: self.as_of_date?,
            currency: self.currency.clone()?,
        })
    }
}

/// A fully resolved selection: the key every data and narrative fetch uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedTuple {
    pub company: CompanyId,
    pub product: ProductId,
    pub snapshot: SnapshotId,
    pub as_of_date: NaiveDate,
    pub currency: Currency,
}

impl ResolvedTuple {
    /// Same value as `Selection::fingerprint` for the equivalent selection.
    pub fn fingerprint(&self) -> Fingerprint {
        Selection::from(self.clone()).fingerprint()
    }

    /// Query parameters in canonical order: snapshot, as_of_date, currency.
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("snapshot", self.snapshot.to_string()),
            ("as_of_date", format_date(self.as_of_date)),
            ("currency", self.currency.to_string()),
        ]
    }
}

impl From<ResolvedTuple> for Selection {
    fn from(tuple: ResolvedTuple) -> Self {
        Self {
            company: Some(tuple.company),
            product: Some(tuple.product),
            snapshot: Some(tuple.snapshot),
            as_of_date: Some(tuple.as_of_date),
            currency: Some(tuple.currency),
        }
    }
}

impl fmt::Display for ResolvedTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{} as of {} in {}",
            self.company,
            self.product,
            self.snapshot,
            format_date(self.as_of_date),
            self.currency
        )
    }
}

// ============================================================================
// CHART TABS
// ============================================================================

/// Chart endpoints served under `/charts/{slug}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChartTab {
    ActualVsExpected,
    Deployment,
    CollectionVelocity,
    DenialTrend,
    Ageing,
    Revenue,
    Concentration,
    Cohort,
}

impl ChartTab {
    pub fn all() -> &'static [ChartTab] {
        &[
            ChartTab::ActualVsExpected,
            ChartTab::Deployment,
            ChartTab::CollectionVelocity,
            ChartTab::DenialTrend,
            ChartTab::Ageing,
            ChartTab::Revenue,
            ChartTab::Concentration,
            ChartTab::Cohort,
        ]
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ChartTab::ActualVsExpected => "actual-vs-expected",
            ChartTab::Deployment => "deployment",
            ChartTab::CollectionVelocity => "collection-velocity",
            ChartTab::DenialTrend => "denial-trend",
            ChartTab::Ageing => "ageing",
            ChartTab::Revenue => "revenue",
            ChartTab::Concentration => "concentration",
            ChartTab::Cohort => "cohort",
        }
    }
}

impl fmt::Display for ChartTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ChartTab {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::all()
            .iter()
            .copied()
            .find(|tab| tab.slug() == normalized)
            .ok_or_else(|| CoreError::UnknownTab(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full() -> Selection {
        Selection {
            company: Some("acme".into()),
            product: Some("loan_product".into()),
            snapshot: Some("2024-01-31".into()),
            as_of_date: Some(date(2024, 1, 31)),
            currency: Some(Currency::new("AED")),
        }
    }

    #[test]
    fn test_levels_are_ordered_upstream_first() {
        assert!(Level::Company < Level::Product);
        assert!(Level::Snapshot < Level::DateRange);
        assert!(Level::AsOfDate < Level::Currency);
        let below: Vec<Level> = Level::Snapshot.below().collect();
        assert_eq!(
            below,
            vec![Level::DateRange, Level::AsOfDate, Level::Currency]
        );
    }

    #[test]
    fn test_resolved_requires_every_level() {
        let mut selection = full();
        assert!(selection.resolved().is_some());
        selection.clear(Level::AsOfDate);
        assert!(selection.resolved().is_none());
    }

    #[test]
    fn test_tuple_fingerprint_matches_selection() {
        let selection = full();
        let tuple = selection.resolved().unwrap();
        assert_eq!(tuple.fingerprint(), selection.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_any_level() {
        let base = full();
        let mut changed = base.clone();
        changed.apply(Choice::Currency(Currency::usd()));
        assert_ne!(base.fingerprint(), changed.fingerprint());
        // Upstream scope is unaffected by a downstream change.
        assert_eq!(
            base.fingerprint_through(Level::Snapshot),
            changed.fingerprint_through(Level::Snapshot)
        );
    }

    #[test]
    fn test_date_range_scope_equals_snapshot_scope() {
        let selection = full();
        assert_eq!(
            selection.fingerprint_through(Level::DateRange),
            selection.fingerprint_through(Level::Snapshot)
        );
    }

    #[test]
    fn test_query_pairs_order() {
        let tuple = full().resolved().unwrap();
        let keys: Vec<&str> = tuple.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["snapshot", "as_of_date", "currency"]);
        assert_eq!(tuple.query_pairs()[1].1, "2024-01-31");
    }

    #[test]
    fn test_chart_tab_parse() {
        assert_eq!(
            "collection-velocity".parse::<ChartTab>().unwrap(),
            ChartTab::CollectionVelocity
        );
        assert_eq!(
            "Actual_Vs_Expected".parse::<ChartTab>().unwrap(),
            ChartTab::ActualVsExpected
        );
        assert!(matches!(
            "overview".parse::<ChartTab>(),
            Err(CoreError::UnknownTab(_))
        ));
    }

    #[test]
    fn test_parse_date_rejects_bad_input() {
        assert_eq!(parse_date("2024-02-29").unwrap(), date(2024, 2, 29));
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }
}
