//! Production rollup tests
//!
//! Tests for the aggregate chain including:
//! - Norm category totals as the sum of their leaf records
//! - Calendar chain (line -> daily) and norm chain (category -> norm -> report) agreeing
//! - Full re-aggregation staying free of drift across create/update/delete
//! - Recompute idempotence

use proptest::prelude::*;
use shared::{aggregate, OutputTotals, RollupLevel, RECOMPUTE_ORDER};
use std::collections::BTreeMap;

/// Leaf key: (line slot, day, norm category)
type LeafKey = (usize, usize, usize);

/// In-memory report: two production lines, a few days, a few categories per line
#[derive(Debug, Default)]
struct ReportModel {
    leaves: BTreeMap<LeafKey, OutputTotals>,
}

impl ReportModel {
    fn upsert(&mut self, key: LeafKey, totals: OutputTotals) {
        self.leaves.insert(key, totals);
    }

    fn delete(&mut self, key: LeafKey) {
        self.leaves.remove(&key);
    }

    fn norm_category(&self, line: usize, category: usize) -> OutputTotals {
        aggregate(
            self.leaves
                .iter()
                .filter(|((l, _, c), _)| *l == line && *c == category)
                .map(|(_, t)| t),
        )
    }

    fn line(&self, line: usize, day: usize) -> OutputTotals {
        aggregate(
            self.leaves
                .iter()
                .filter(|((l, d, _), _)| *l == line && *d == day)
                .map(|(_, t)| t),
        )
    }

    fn production_norm(&self, line: usize, categories: usize) -> OutputTotals {
        let per_category: Vec<OutputTotals> =
            (0..categories).map(|c| self.norm_category(line, c)).collect();
        aggregate(&per_category)
    }

    fn daily(&self, day: usize, lines: usize) -> OutputTotals {
        let per_line: Vec<OutputTotals> = (0..lines).map(|l| self.line(l, day)).collect();
        aggregate(&per_line)
    }

    fn report_via_norms(&self, lines: usize, categories: usize) -> OutputTotals {
        let per_norm: Vec<OutputTotals> = (0..lines)
            .map(|l| self.production_norm(l, categories))
            .collect();
        aggregate(&per_norm)
    }

    fn report_via_calendar(&self, lines: usize, days: usize) -> OutputTotals {
        let per_day: Vec<OutputTotals> = (0..days).map(|d| self.daily(d, lines)).collect();
        aggregate(&per_day)
    }
}

const LINES: usize = 2;
const DAYS: usize = 3;
const CATEGORIES: usize = 3;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Two leaves under one category of norm 100
    #[test]
    fn test_norm_category_sums_leaves() {
        let mut report = ReportModel::default();
        report.upsert((0, 0, 0), OutputTotals::new(10, 5, 0));
        report.upsert((0, 1, 0), OutputTotals::new(3, 0, 2));

        assert_eq!(report.norm_category(0, 0), OutputTotals::new(13, 5, 2));
        assert_eq!(report.production_norm(0, CATEGORIES), OutputTotals::new(13, 5, 2));
    }

    /// An empty category reads as zero, not as missing
    #[test]
    fn test_empty_category_is_zero() {
        let report = ReportModel::default();
        assert!(report.norm_category(1, 2).is_zero());
        assert!(report.report_via_norms(LINES, CATEGORIES).is_zero());
    }

    /// Deleting the last leaf of a day zeroes that line's day
    #[test]
    fn test_delete_zeroes_line_day() {
        let mut report = ReportModel::default();
        report.upsert((1, 2, 0), OutputTotals::new(4, 4, 4));
        report.delete((1, 2, 0));

        assert!(report.line(1, 2).is_zero());
        assert!(report.daily(2, LINES).is_zero());
    }

    /// Leaf totals reach the report through both chains
    #[test]
    fn test_both_chains_reach_the_report() {
        let mut report = ReportModel::default();
        report.upsert((0, 0, 0), OutputTotals::new(10, 5, 0));
        report.upsert((0, 0, 1), OutputTotals::new(1, 1, 1));
        report.upsert((1, 2, 2), OutputTotals::new(7, 0, 3));

        let expected = OutputTotals::new(18, 6, 4);
        assert_eq!(report.report_via_norms(LINES, CATEGORIES), expected);
        assert_eq!(report.report_via_calendar(LINES, DAYS), expected);
    }

    /// Norm chain is recomputed before the calendar chain and planning
    #[test]
    fn test_recompute_order() {
        let position = |level: RollupLevel| RECOMPUTE_ORDER.iter().position(|l| *l == level);

        assert!(position(RollupLevel::NormCategory) < position(RollupLevel::ProductionNorm));
        assert!(position(RollupLevel::ProductionNorm) < position(RollupLevel::ProductionReport));
        assert!(position(RollupLevel::ProductionReport) < position(RollupLevel::Line));
        assert!(position(RollupLevel::Line) < position(RollupLevel::Daily));
        assert!(position(RollupLevel::Daily) < position(RollupLevel::MonthPlaning));
        assert_eq!(RECOMPUTE_ORDER.len(), 8);
    }

    #[test]
    fn test_level_names_are_snake_case() {
        for level in RECOMPUTE_ORDER {
            let name = level.as_str();
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Upsert(LeafKey, OutputTotals),
        Delete(LeafKey),
    }

    fn key_strategy() -> impl Strategy<Value = LeafKey> {
        (0..LINES, 0..DAYS, 0..CATEGORIES)
    }

    fn totals_strategy() -> impl Strategy<Value = OutputTotals> {
        (0i32..=100, 0i32..=100, 0i32..=30).prop_map(|(s1, s2, d)| OutputTotals::new(s1, s2, d))
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (key_strategy(), totals_strategy()).prop_map(|(k, t)| Op::Upsert(k, t)),
            1 => key_strategy().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Incrementally patched ancestors would drift; full re-aggregation never does
        #[test]
        fn prop_no_drift_after_any_history(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut report = ReportModel::default();
            let mut running = OutputTotals::ZERO;

            for op in &ops {
                match op {
                    Op::Upsert(key, totals) => {
                        let old = report.leaves.get(key).copied().unwrap_or_default();
                        running = running - old + *totals;
                        report.upsert(*key, *totals);
                    }
                    Op::Delete(key) => {
                        let old = report.leaves.get(key).copied().unwrap_or_default();
                        running = running - old;
                        report.delete(*key);
                    }
                }

                let by_norms = report.report_via_norms(LINES, CATEGORIES);
                let by_calendar = report.report_via_calendar(LINES, DAYS);
                prop_assert_eq!(by_norms, running);
                prop_assert_eq!(by_calendar, running);
            }
        }

        /// Each category equals the sum of its own leaves, whatever else changed
        #[test]
        fn prop_category_equals_its_leaves(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut report = ReportModel::default();
            for op in &ops {
                match op {
                    Op::Upsert(key, totals) => report.upsert(*key, *totals),
                    Op::Delete(key) => report.delete(*key),
                }
            }

            for line in 0..LINES {
                for category in 0..CATEGORIES {
                    let expected: OutputTotals = report
                        .leaves
                        .iter()
                        .filter(|((l, _, c), _)| *l == line && *c == category)
                        .map(|(_, t)| *t)
                        .sum();
                    prop_assert_eq!(report.norm_category(line, category), expected);
                }
            }
        }

        /// Recomputing twice gives the same totals as once
        #[test]
        fn prop_recompute_idempotent(ops in prop::collection::vec(op_strategy(), 1..20)) {
            let mut report = ReportModel::default();
            for op in &ops {
                if let Op::Upsert(key, totals) = op {
                    report.upsert(*key, *totals);
                }
            }

            let first = report.report_via_norms(LINES, CATEGORIES);
            let second = report.report_via_norms(LINES, CATEGORIES);
            prop_assert_eq!(first, second);
        }

        /// Totals never go negative when leaves are non-negative
        #[test]
        fn prop_totals_non_negative(ops in prop::collection::vec(op_strategy(), 1..30)) {
            let mut report = ReportModel::default();
            for op in &ops {
                match op {
                    Op::Upsert(key, totals) => report.upsert(*key, *totals),
                    Op::Delete(key) => report.delete(*key),
                }
                let total = report.report_via_calendar(LINES, DAYS);
                prop_assert!(total.sort_1 >= 0 && total.sort_2 >= 0 && total.defect >= 0);
            }
        }
    }
}
