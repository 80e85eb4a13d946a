//! WebAssembly module for the Garment Production Management Platform
//!
//! Provides client-side computation for the dashboard:
//! - Plan and norm completion percentages
//! - Average day norm of a report
//! - Report calendar length and Sunday detection
//! - Stock preview of a leaf record edit before it is saved

use chrono::NaiveDate;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::ledger::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Fact over plan in percent, one decimal; 0 without a plan
#[wasm_bindgen]
pub fn completion_percent(fact: i32, plan: i32) -> f64 {
    let percent = shared::rollup::percent_done(i64::from(fact), i64::from(plan));
    percent.to_string().parse().unwrap_or(0.0)
}

/// Average daily norm; pass 0 working days when unknown
#[wasm_bindgen]
pub fn average_day_norm(total_norm: i32, working_days: i32) -> i32 {
    let days = if working_days > 0 {
        Some(working_days)
    } else {
        None
    };
    shared::rollup::day_norm(total_norm, days)
}

/// Number of daily rows a report for this period gets
#[wasm_bindgen]
pub fn report_calendar_length(year: i32, month: &str) -> Result<u32, JsValue> {
    let period = validate_period(year, month).map_err(JsValue::from_str)?;
    Ok(period.days_in_month())
}

/// Whether an ISO date (YYYY-MM-DD) is a non-working day
#[wasm_bindgen]
pub fn is_non_working_day(date: &str) -> Result<bool, JsValue> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| JsValue::from_str(&format!("Invalid date: {}", e)))?;
    Ok(is_weekend(date))
}

/// Validate leaf quantities before submitting them
#[wasm_bindgen]
pub fn validate_leaf_quantities(sort_1: i32, sort_2: i32, defect: i32) -> bool {
    validate_output(&OutputTotals::new(sort_1, sort_2, defect)).is_ok()
}

/// Stock moves a leaf edit would cause, as JSON.
///
/// `old_json` / `new_json` are `{"sort_1", "sort_2", "defect"}` objects (use
/// zeros for a new or deleted record); `accessories_json` is the article's
/// list of `{"accessory_id", "ratio"}`.
#[wasm_bindgen]
pub fn preview_leaf_stock(
    old_json: &str,
    new_json: &str,
    accessories_json: &str,
) -> Result<String, JsValue> {
    preview(old_json, new_json, accessories_json).map_err(|e| JsValue::from_str(&e))
}

fn preview(old_json: &str, new_json: &str, accessories_json: &str) -> Result<String, String> {
    let old: OutputTotals =
        serde_json::from_str(old_json).map_err(|e| format!("Invalid old totals JSON: {}", e))?;
    let new: OutputTotals =
        serde_json::from_str(new_json).map_err(|e| format!("Invalid new totals JSON: {}", e))?;
    let accessories: Vec<AccessoryRatio> = serde_json::from_str(accessories_json)
        .map_err(|e| format!("Invalid accessories JSON: {}", e))?;
    validate_output(&old).map_err(|e| format!("Old totals: {}", e))?;
    validate_output(&new).map_err(|e| format!("New totals: {}", e))?;

    let plan = plan_stock_moves(&LeafChange::update(old, new), &accessories);
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_percent() {
        assert!((completion_percent(50, 200) - 25.0).abs() < 0.001);
        assert!((completion_percent(1, 3) - 33.3).abs() < 0.001);
        assert_eq!(completion_percent(10, 0), 0.0);
    }

    #[test]
    fn test_average_day_norm() {
        assert_eq!(average_day_norm(2600, 26), 100);
        assert_eq!(average_day_norm(2600, 0), 0);
    }

    #[test]
    fn test_validate_leaf_quantities() {
        assert!(validate_leaf_quantities(10, 5, 0));
        assert!(!validate_leaf_quantities(10, -1, 0));
    }

    #[test]
    fn test_preview_counts_defects_as_consumed() {
        let json = preview(
            r#"{"sort_1":5,"sort_2":0,"defect":0}"#,
            r#"{"sort_1":8,"sort_2":0,"defect":1}"#,
            "[]",
        )
        .unwrap();
        let plan: StockPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan.variant_delta, -4);
        assert_eq!(plan.packaging.sort_1, 3);
        assert!(plan.accessory_moves.is_empty());
    }

    #[test]
    fn test_preview_rejects_out_of_range_totals() {
        let err = preview(
            r#"{"sort_1":0,"sort_2":0,"defect":0}"#,
            r#"{"sort_1":2147483647,"sort_2":1,"defect":0}"#,
            "[]",
        )
        .unwrap_err();
        assert!(err.starts_with("New totals"));
        assert!(!validate_leaf_quantities(i32::MAX, 1, 0));
    }

    #[test]
    fn test_preview_rejects_bad_json() {
        assert!(preview("{", "{}", "[]").is_err());
    }
}
