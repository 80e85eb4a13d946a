//! Planning and reporting tests
//!
//! Tests for derived plan figures including:
//! - Completion percentage of plans, orders and norm categories
//! - Average day norm of a report
//! - Sewing category summaries (norm vs sellable output)
//! - Input validation of plan, report and leaf payloads

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    day_norm, percent_done, summarize_categories, CategoryFact, CreateMonthPlaningInput,
    CreateReportInput, LeafRecordInput, MonthPlaningOrderInput, OutputTotals,
};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_percent_done() {
        assert_eq!(percent_done(18, 100), dec("18"));
        assert_eq!(percent_done(2, 3), dec("66.7"));
        assert_eq!(percent_done(250, 200), dec("125"));
    }

    /// No plan means 0%, never a division error
    #[test]
    fn test_percent_done_without_plan() {
        assert_eq!(percent_done(0, 0), Decimal::ZERO);
        assert_eq!(percent_done(40, 0), Decimal::ZERO);
    }

    #[test]
    fn test_day_norm() {
        assert_eq!(day_norm(2600, Some(26)), 100);
        assert_eq!(day_norm(2650, Some(26)), 102);
        assert_eq!(day_norm(2600, None), 0);
    }

    /// Categories group by sewing category and count only sellable output
    #[test]
    fn test_category_summary() {
        let shirts = Uuid::new_v4();
        let pants = Uuid::new_v4();
        let facts = [
            CategoryFact {
                sewing_category_id: shirts,
                norm: 100,
                totals: OutputTotals::new(13, 5, 2),
            },
            CategoryFact {
                sewing_category_id: shirts,
                norm: 50,
                totals: OutputTotals::new(10, 0, 9),
            },
            CategoryFact {
                sewing_category_id: pants,
                norm: 80,
                totals: OutputTotals::new(0, 0, 0),
            },
        ];

        let rows = summarize_categories(&facts);
        assert_eq!(rows.len(), 2);

        let shirt_row = rows.iter().find(|r| r.category_id == shirts).unwrap();
        assert_eq!(shirt_row.norm, 150);
        assert_eq!(shirt_row.actual, 28);

        let pant_row = rows.iter().find(|r| r.category_id == pants).unwrap();
        assert_eq!(pant_row.norm, 80);
        assert_eq!(pant_row.actual, 0);
    }

    #[test]
    fn test_report_input_validation() {
        let valid = CreateReportInput {
            warehouse_id: Uuid::new_v4(),
            year: 2025,
            month: "03".to_string(),
            working_days: Some(26),
            comment: None,
        };
        assert!(valid.validate().is_ok());

        let bad_month = CreateReportInput {
            month: "3".to_string(),
            ..valid.clone()
        };
        assert!(bad_month.validate().is_err());

        let bad_days = CreateReportInput {
            working_days: Some(0),
            ..valid
        };
        assert!(bad_days.validate().is_err());
    }

    #[test]
    fn test_plan_input_validation() {
        let plan = CreateMonthPlaningInput {
            warehouse_id: Uuid::new_v4(),
            year: 2025,
            month: "12".to_string(),
            day_planing: "26".to_string(),
            comment: None,
        };
        assert!(plan.validate().is_ok());

        let order = MonthPlaningOrderInput {
            order_id: Uuid::new_v4(),
            planed_quantity: -1,
            comment: None,
        };
        assert!(order.validate().is_err());
    }

    /// Missing grades deserialize as zero
    #[test]
    fn test_leaf_input_nullable_grades() {
        let json = format!(
            r#"{{"line_id":"{}","norm_category_id":"{}","sort_1":7}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let input: LeafRecordInput = serde_json::from_str(&json).unwrap();

        assert!(input.validate().is_ok());
        assert_eq!(input.totals(), OutputTotals::new(7, 0, 0));
    }

    #[test]
    fn test_leaf_input_rejects_negative() {
        let input = LeafRecordInput {
            line_id: Uuid::new_v4(),
            norm_category_id: Uuid::new_v4(),
            sort_1: 3,
            sort_2: Some(-1),
            defect_quantity: None,
        };
        assert!(input.validate().is_err());
    }

    /// Quantities past the per-record limit never reach the stock plan
    #[test]
    fn test_leaf_input_rejects_oversized_quantity() {
        let input = LeafRecordInput {
            line_id: Uuid::new_v4(),
            norm_category_id: Uuid::new_v4(),
            sort_1: i32::MAX,
            sort_2: Some(1),
            defect_quantity: None,
        };
        assert!(input.validate().is_err());
        assert!(shared::validate_output(&input.totals()).is_err());

        let at_limit = LeafRecordInput {
            sort_1: shared::MAX_LEAF_QUANTITY,
            sort_2: Some(shared::MAX_LEAF_QUANTITY),
            defect_quantity: Some(shared::MAX_LEAF_QUANTITY),
            ..input
        };
        assert!(at_limit.validate().is_ok());
        assert_eq!(at_limit.totals().consumed(), 3 * shared::MAX_LEAF_QUANTITY);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn fact_strategy(categories: Vec<Uuid>) -> impl Strategy<Value = CategoryFact> {
        (
            prop::sample::select(categories),
            1i32..=500,
            0i32..=300,
            0i32..=300,
            0i32..=50,
        )
            .prop_map(|(id, norm, s1, s2, d)| CategoryFact {
                sewing_category_id: id,
                norm,
                totals: OutputTotals::new(s1, s2, d),
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Percent is 100 exactly when fact meets plan
        #[test]
        fn prop_percent_full_at_plan(plan in 1i64..=100_000) {
            prop_assert_eq!(percent_done(plan, plan), Decimal::from(100));
        }

        /// Percent grows with the fact
        #[test]
        fn prop_percent_monotonic(plan in 1i64..=10_000, a in 0i64..=10_000, b in 0i64..=10_000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(percent_done(low, plan) <= percent_done(high, plan));
        }

        /// Day norm times working days stays within half a day per day of the total
        #[test]
        fn prop_day_norm_close_to_total(total in 0i32..=100_000, days in 1i32..=31) {
            let norm = day_norm(total, Some(days));
            let spread = (i64::from(norm) * i64::from(days) - i64::from(total)).abs();
            prop_assert!(spread <= i64::from(days));
        }

        /// Summaries keep the overall norm and sellable output
        #[test]
        fn prop_summary_preserves_totals(
            facts in prop::collection::vec(
                fact_strategy(vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]),
                0..20
            )
        ) {
            let rows = summarize_categories(&facts);

            let norm: i64 = facts.iter().map(|f| i64::from(f.norm)).sum();
            let actual: i64 = facts.iter().map(|f| i64::from(f.totals.sellable())).sum();
            prop_assert_eq!(rows.iter().map(|r| r.norm).sum::<i64>(), norm);
            prop_assert_eq!(rows.iter().map(|r| r.actual).sum::<i64>(), actual);
            prop_assert!(rows.len() <= 3);
        }
    }
}
