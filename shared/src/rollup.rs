//! Rollup arithmetic shared by the backend and the dashboard
//!
//! The backend recomputes stored aggregates with SQL; the helpers here give
//! the same definitions for derived read-side values and category summaries.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::OutputTotals;

/// Aggregate levels in the order they are recomputed after a leaf write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupLevel {
    NormCategory,
    LineDailyOutput,
    ProductionNorm,
    ProductionReport,
    Line,
    Daily,
    MonthPlaning,
    MonthPlaningOrder,
}

impl RollupLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollupLevel::NormCategory => "norm_category",
            RollupLevel::LineDailyOutput => "line_daily_output",
            RollupLevel::ProductionNorm => "production_norm",
            RollupLevel::ProductionReport => "production_report",
            RollupLevel::Line => "line",
            RollupLevel::Daily => "daily",
            RollupLevel::MonthPlaning => "month_planing",
            RollupLevel::MonthPlaningOrder => "month_planing_order",
        }
    }
}

/// Fixed recompute order: canonical norm-category chain first, then the
/// calendar chain, then planning facts.
pub const RECOMPUTE_ORDER: [RollupLevel; 8] = [
    RollupLevel::NormCategory,
    RollupLevel::LineDailyOutput,
    RollupLevel::ProductionNorm,
    RollupLevel::ProductionReport,
    RollupLevel::Line,
    RollupLevel::Daily,
    RollupLevel::MonthPlaning,
    RollupLevel::MonthPlaningOrder,
];

/// Full re-aggregation of child totals; no children means zero
pub fn aggregate<'a, I>(children: I) -> OutputTotals
where
    I: IntoIterator<Item = &'a OutputTotals>,
{
    children.into_iter().sum()
}

/// Fact over plan as a percentage rounded to one decimal, 0 without a plan
pub fn percent_done(fact: i64, plan: i64) -> Decimal {
    if plan == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(fact) * Decimal::from(100) / Decimal::from(plan)).round_dp(1)
}

/// Average daily norm for a report, 0 when the working-day count is unknown
pub fn day_norm(total_norm: i32, working_days: Option<i32>) -> i32 {
    match working_days {
        Some(days) if days > 0 => (Decimal::from(total_norm) / Decimal::from(days))
            .round()
            .to_i32()
            .unwrap_or(0),
        _ => 0,
    }
}

/// One norm category as seen by the category summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFact {
    pub sewing_category_id: Uuid,
    pub norm: i32,
    pub totals: OutputTotals,
}

/// Norm vs actual for one sewing category of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummaryRow {
    pub category_id: Uuid,
    pub norm: i64,
    pub actual: i64,
}

/// Group norm-category facts by sewing category
pub fn summarize_categories(facts: &[CategoryFact]) -> Vec<CategorySummaryRow> {
    let mut grouped: BTreeMap<Uuid, CategorySummaryRow> = BTreeMap::new();
    for fact in facts {
        let row = grouped
            .entry(fact.sewing_category_id)
            .or_insert(CategorySummaryRow {
                category_id: fact.sewing_category_id,
                norm: 0,
                actual: 0,
            });
        row.norm += i64::from(fact.norm);
        row.actual += i64::from(fact.totals.sellable());
    }
    grouped.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_percent_done() {
        assert_eq!(percent_done(50, 200), Decimal::from(25));
        assert_eq!(percent_done(1, 3), Decimal::from_str("33.3").unwrap());
        assert_eq!(percent_done(10, 0), Decimal::ZERO);
    }

    #[test]
    fn test_day_norm() {
        assert_eq!(day_norm(2600, Some(26)), 100);
        assert_eq!(day_norm(100, Some(3)), 33);
        assert_eq!(day_norm(100, Some(0)), 0);
        assert_eq!(day_norm(100, None), 0);
    }

    #[test]
    fn test_recompute_order_starts_at_norm_category() {
        assert_eq!(RECOMPUTE_ORDER[0], RollupLevel::NormCategory);
        assert_eq!(RECOMPUTE_ORDER.last(), Some(&RollupLevel::MonthPlaningOrder));
    }

    #[test]
    fn test_summarize_categories_groups() {
        let shirts = Uuid::new_v4();
        let pants = Uuid::new_v4();
        let facts = vec![
            CategoryFact {
                sewing_category_id: shirts,
                norm: 100,
                totals: OutputTotals::new(40, 5, 2),
            },
            CategoryFact {
                sewing_category_id: pants,
                norm: 50,
                totals: OutputTotals::new(10, 0, 0),
            },
            CategoryFact {
                sewing_category_id: shirts,
                norm: 20,
                totals: OutputTotals::new(3, 1, 9),
            },
        ];
        let rows = summarize_categories(&facts);
        assert_eq!(rows.len(), 2);
        let shirt_row = rows.iter().find(|r| r.category_id == shirts).unwrap();
        assert_eq!(shirt_row.norm, 120);
        assert_eq!(shirt_row.actual, 49);
    }
}
