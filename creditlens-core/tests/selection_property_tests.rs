//! Property-Based Tests for Selections and Fingerprints

use chrono::NaiveDate;
use creditlens_core::{
    Choice, CompanyId, Currency, Level, ProductId, ResolvedTuple, Selection, SnapshotId,
};
use proptest::prelude::*;

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2019i32..2030, 1u32..=12, 1u32..=28)
        .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

fn arb_currency() -> impl Strategy<Value = Currency> {
    "[A-Z]{3}".prop_map(Currency::new)
}

fn arb_resolved_tuple() -> impl Strategy<Value = ResolvedTuple> {
    (
        "[a-z][a-z0-9_]{0,10}",
        "[a-z][a-z0-9_]{0,14}",
        arb_date(),
        arb_date(),
        arb_currency(),
    )
        .prop_map(|(company, product, tape, as_of_date, currency)| ResolvedTuple {
            company: CompanyId::new(company),
            product: ProductId::new(product),
            snapshot: SnapshotId::new(creditlens_core::format_date(tape)),
            as_of_date,
            currency,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A resolved tuple and the selection it came from share a fingerprint.
    #[test]
    fn prop_tuple_fingerprint_matches_selection(tuple in arb_resolved_tuple()) {
        let selection = Selection::from(tuple.clone());
        prop_assert_eq!(selection.fingerprint(), tuple.fingerprint());
        prop_assert_eq!(selection.resolved(), Some(tuple));
    }

    /// Changing a level changes the fingerprint through that level and
    /// leaves every upstream scope untouched.
    #[test]
    fn prop_change_only_affects_downstream_scopes(
        tuple in arb_resolved_tuple(),
        currency in arb_currency(),
        as_of in arb_date(),
    ) {
        let base = Selection::from(tuple.clone());
        let choices = [Choice::Currency(currency), Choice::AsOfDate(as_of)];
        for choice in choices {
            let level = choice.level();
            let mut changed = base.clone();
            let differs = !changed.holds(&choice);
            changed.apply(choice);

            for upstream in Level::all().iter().filter(|l| **l < level) {
                prop_assert_eq!(
                    base.fingerprint_through(*upstream),
                    changed.fingerprint_through(*upstream)
                );
            }
            prop_assert_eq!(
                base.fingerprint_through(level) != changed.fingerprint_through(level),
                differs
            );
        }
    }

    /// Unset levels never collide with set ones.
    #[test]
    fn prop_cleared_level_changes_fingerprint(tuple in arb_resolved_tuple()) {
        let full = Selection::from(tuple);
        for level in Level::all().iter().filter(|l| l.is_selectable()) {
            let mut partial = full.clone();
            partial.clear(*level);
            prop_assert_ne!(partial.fingerprint(), full.fingerprint());
            prop_assert!(partial.resolved().is_none());
        }
    }

    #[test]
    fn prop_query_pairs_follow_tuple(tuple in arb_resolved_tuple()) {
        let pairs = tuple.query_pairs();
        prop_assert_eq!(pairs[0].1.as_str(), tuple.snapshot.as_str());
        prop_assert_eq!(&pairs[1].1, &creditlens_core::format_date(tuple.as_of_date));
        prop_assert_eq!(pairs[2].1.as_str(), tuple.currency.as_str());
    }
}
