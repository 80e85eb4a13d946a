//! Validation utilities for the production platform

use validator::ValidationError;

use crate::types::{OutputTotals, ReportPeriod, MAX_LEAF_QUANTITY};

// ============================================================================
// Production Validations
// ============================================================================

/// Leaf quantities are never negative and never exceed [`MAX_LEAF_QUANTITY`]
pub fn validate_output(totals: &OutputTotals) -> Result<(), &'static str> {
    if totals.sort_1 < 0 || totals.sort_2 < 0 || totals.defect < 0 {
        return Err("Produced quantities cannot be negative");
    }
    if totals.sort_1 > MAX_LEAF_QUANTITY
        || totals.sort_2 > MAX_LEAF_QUANTITY
        || totals.defect > MAX_LEAF_QUANTITY
    {
        return Err("Produced quantity exceeds the per-record limit");
    }
    Ok(())
}

/// Norm targets must be positive
pub fn validate_norm(norm: i32) -> Result<(), &'static str> {
    if norm <= 0 {
        return Err("Norm must be greater than zero");
    }
    Ok(())
}

/// Report and plan years accepted by the dashboard
pub fn validate_year(year: i32) -> Result<(), &'static str> {
    if !(2000..=2100).contains(&year) {
        return Err("Year must be between 2000 and 2100");
    }
    Ok(())
}

/// Validate a year + two-digit month pair and return the period
pub fn validate_period(year: i32, month: &str) -> Result<ReportPeriod, &'static str> {
    validate_year(year)?;
    ReportPeriod::parse(year, month)
}

/// Manual stock adjustments must move something
pub fn validate_adjustment_delta(delta: i32) -> Result<(), &'static str> {
    if delta == 0 {
        return Err("Adjustment delta cannot be zero");
    }
    Ok(())
}

// ============================================================================
// `validator` hooks
// ============================================================================

/// `#[validate(custom = "...")]` hook for two-digit month codes
pub fn validate_month_code(month: &str) -> Result<(), ValidationError> {
    ReportPeriod::parse(2000, month)
        .map(|_| ())
        .map_err(|_| ValidationError::new("month_code"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output() {
        assert!(validate_output(&OutputTotals::new(0, 0, 0)).is_ok());
        assert!(validate_output(&OutputTotals::new(10, 5, 1)).is_ok());
        assert!(validate_output(&OutputTotals::new(-1, 0, 0)).is_err());
        assert!(validate_output(&OutputTotals::new(0, 0, -2)).is_err());
    }

    #[test]
    fn test_validate_output_upper_bound() {
        let at_limit = OutputTotals::new(MAX_LEAF_QUANTITY, MAX_LEAF_QUANTITY, MAX_LEAF_QUANTITY);
        assert!(validate_output(&at_limit).is_ok());
        assert_eq!(at_limit.consumed(), 3 * MAX_LEAF_QUANTITY);

        assert!(validate_output(&OutputTotals::new(i32::MAX, 1, 0)).is_err());
        assert!(validate_output(&OutputTotals::new(0, MAX_LEAF_QUANTITY + 1, 0)).is_err());
        assert!(validate_output(&OutputTotals::new(0, 0, i32::MAX)).is_err());
    }

    #[test]
    fn test_validate_norm() {
        assert!(validate_norm(100).is_ok());
        assert!(validate_norm(0).is_err());
        assert!(validate_norm(-5).is_err());
    }

    #[test]
    fn test_validate_period() {
        let period = validate_period(2025, "03").unwrap();
        assert_eq!(period.days_in_month(), 31);
        assert!(validate_period(1999, "03").is_err());
        assert!(validate_period(2025, "3").is_err());
    }

    #[test]
    fn test_month_code_hook() {
        assert!(validate_month_code("12").is_ok());
        assert!(validate_month_code("13").is_err());
    }

    #[test]
    fn test_adjustment_delta() {
        assert!(validate_adjustment_delta(-4).is_ok());
        assert!(validate_adjustment_delta(0).is_err());
    }
}
