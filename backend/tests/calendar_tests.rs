//! Report calendar tests
//!
//! Tests for bulk report creation including:
//! - One daily row per calendar day of the report month
//! - Leap-year Februaries
//! - Month code parsing and Sunday detection

use chrono::{Datelike, NaiveDate, Weekday};
use proptest::prelude::*;
use shared::{is_weekend, validate_period, ReportPeriod};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A March report gets 31 dailies, 2025-03-01 through 2025-03-31
    #[test]
    fn test_march_calendar() {
        let period = validate_period(2025, "03").unwrap();
        let dates = period.dates();

        assert_eq!(dates.len(), 31);
        assert_eq!(dates.first(), Some(&date(2025, 3, 1)));
        assert_eq!(dates.last(), Some(&date(2025, 3, 31)));
    }

    #[test]
    fn test_leap_february() {
        assert_eq!(ReportPeriod::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(ReportPeriod::new(2025, 2).unwrap().days_in_month(), 28);
        assert_eq!(ReportPeriod::new(2000, 2).unwrap().days_in_month(), 29);
        assert_eq!(ReportPeriod::new(2100, 2).unwrap().days_in_month(), 28);
    }

    #[test]
    fn test_thirty_day_months() {
        for month in ["04", "06", "09", "11"] {
            let period = validate_period(2025, month).unwrap();
            assert_eq!(period.dates().len(), 30, "month {}", month);
        }
    }

    #[test]
    fn test_month_code_round_trip() {
        let period = validate_period(2025, "09").unwrap();
        assert_eq!(period.month_code(), "09");
        assert_eq!(period.month_name(), "Sentabr");
    }

    #[test]
    fn test_invalid_periods_rejected() {
        assert!(validate_period(2025, "3").is_err());
        assert!(validate_period(2025, "13").is_err());
        assert!(validate_period(1999, "01").is_err());
        assert!(validate_period(2025, "").is_err());
    }

    /// March 2025 has five Sundays
    #[test]
    fn test_sundays_in_march() {
        let period = validate_period(2025, "03").unwrap();
        let sundays: Vec<u32> = period
            .dates()
            .into_iter()
            .filter(|d| is_weekend(*d))
            .map(|d| d.day())
            .collect();
        assert_eq!(sundays, vec![2, 9, 16, 23, 30]);
    }

    #[test]
    fn test_saturday_is_a_working_day() {
        assert!(!is_weekend(date(2025, 3, 8)));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Dates are contiguous, in order and all inside the period
        #[test]
        fn prop_calendar_is_contiguous(year in 2000i32..=2100, month in 1u32..=12) {
            let period = ReportPeriod::new(year, month).unwrap();
            let dates = period.dates();

            prop_assert_eq!(dates.len() as u32, period.days_in_month());
            prop_assert!((28..=31).contains(&dates.len()));
            prop_assert_eq!(dates[0], period.first_day());
            for pair in dates.windows(2) {
                prop_assert_eq!(pair[0].succ_opt(), Some(pair[1]));
            }
            for d in &dates {
                prop_assert_eq!((d.year(), d.month()), (period.year, period.month));
            }
        }

        /// The day after the last date belongs to the next month
        #[test]
        fn prop_calendar_covers_whole_month(year in 2000i32..=2100, month in 1u32..=12) {
            let period = ReportPeriod::new(year, month).unwrap();
            let last = *period.dates().last().unwrap();
            let next = last.succ_opt().unwrap();
            prop_assert_ne!((next.year(), next.month()), (period.year, period.month));
            prop_assert_eq!(next.day(), 1);
        }

        /// Only Sundays are weekends
        #[test]
        fn prop_weekend_is_sunday(year in 2000i32..=2100, ordinal in 1u32..=365) {
            let d = NaiveDate::from_yo_opt(year, ordinal).unwrap();
            prop_assert_eq!(is_weekend(d), d.weekday() == Weekday::Sun);
        }

        /// Every valid two-digit code parses back to itself
        #[test]
        fn prop_month_code_parses(year in 2000i32..=2100, month in 1u32..=12) {
            let code = format!("{:02}", month);
            let period = validate_period(year, &code).unwrap();
            prop_assert_eq!(period.month, month);
            prop_assert_eq!(period.month_code(), code);
        }
    }
}
