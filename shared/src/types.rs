//! Common types used across the platform

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Largest quantity a single leaf record may carry per grade.
///
/// Keeps `consumed` and every leaf delta well inside `i32`.
pub const MAX_LEAF_QUANTITY: i32 = 1_000_000;

/// Produced quantities split by quality grade
///
/// This is the unit every rollup level aggregates: a leaf record carries one,
/// and each ancestor stores the sum of its children's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputTotals {
    pub sort_1: i32,
    pub sort_2: i32,
    pub defect: i32,
}

impl OutputTotals {
    pub const ZERO: OutputTotals = OutputTotals {
        sort_1: 0,
        sort_2: 0,
        defect: 0,
    };

    pub fn new(sort_1: i32, sort_2: i32, defect: i32) -> Self {
        Self {
            sort_1,
            sort_2,
            defect,
        }
    }

    /// Build totals from nullable columns, treating missing values as zero
    pub fn from_nullable(sort_1: Option<i32>, sort_2: Option<i32>, defect: Option<i32>) -> Self {
        Self {
            sort_1: sort_1.unwrap_or(0),
            sort_2: sort_2.unwrap_or(0),
            defect: defect.unwrap_or(0),
        }
    }

    /// Garments taken off the variant stock: both grades plus defects
    pub fn consumed(&self) -> i32 {
        self.sort_1 + self.sort_2 + self.defect
    }

    /// Sellable output (sort 1 + sort 2), used for plan facts
    pub fn sellable(&self) -> i32 {
        self.sort_1 + self.sort_2
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for OutputTotals {
    type Output = OutputTotals;

    fn add(self, rhs: OutputTotals) -> OutputTotals {
        OutputTotals {
            sort_1: self.sort_1 + rhs.sort_1,
            sort_2: self.sort_2 + rhs.sort_2,
            defect: self.defect + rhs.defect,
        }
    }
}

impl Sub for OutputTotals {
    type Output = OutputTotals;

    fn sub(self, rhs: OutputTotals) -> OutputTotals {
        OutputTotals {
            sort_1: self.sort_1 - rhs.sort_1,
            sort_2: self.sort_2 - rhs.sort_2,
            defect: self.defect - rhs.defect,
        }
    }
}

impl Sum for OutputTotals {
    fn sum<I: Iterator<Item = OutputTotals>>(iter: I) -> Self {
        iter.fold(OutputTotals::ZERO, |acc, t| acc + t)
    }
}

impl<'a> Sum<&'a OutputTotals> for OutputTotals {
    fn sum<I: Iterator<Item = &'a OutputTotals>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Reporting period (year + two-digit month) shared by reports and plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

/// Month names shown on the dashboard, indexed by month - 1
pub const MONTH_NAMES: [&str; 12] = [
    "Yanvar", "Fevral", "Mart", "Aprel", "May", "Iyun", "Iyul", "Avgust", "Sentabr", "Oktyabr",
    "Noyabr", "Dekabr",
];

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, &'static str> {
        if !(1..=12).contains(&month) {
            return Err("Month must be between 01 and 12");
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err("Year is out of range");
        }
        Ok(Self { year, month })
    }

    /// Parse the stored two-digit month code ("03")
    pub fn parse(year: i32, month: &str) -> Result<Self, &'static str> {
        if month.len() != 2 || !month.chars().all(|c| c.is_ascii_digit()) {
            return Err("Month must be a two-digit code such as \"03\"");
        }
        let month: u32 = month.parse().map_err(|_| "Invalid month code")?;
        Self::new(year, month)
    }

    /// Two-digit month code as persisted
    pub fn month_code(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Empty for a month outside 1..=12, which only a hand-built value can hold
    pub fn month_name(&self) -> &'static str {
        self.month
            .checked_sub(1)
            .and_then(|index| MONTH_NAMES.get(index as usize))
            .copied()
            .unwrap_or("")
    }

    pub fn first_day(&self) -> NaiveDate {
        // Validated in the constructor
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Number of calendar days, leap-year aware
    pub fn days_in_month(&self) -> u32 {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
            Some(next) => next.signed_duration_since(self.first_day()).num_days() as u32,
            None => 31,
        }
    }

    /// Every date of the month, in order
    pub fn dates(&self) -> Vec<NaiveDate> {
        (1..=self.days_in_month())
            .filter_map(|day| NaiveDate::from_ymd_opt(self.year, self.month, day))
            .collect()
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Sundays are the only non-working day on the sewing floor
pub fn is_weekend(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}
