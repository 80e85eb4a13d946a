//! Production report, norm and leaf-record models

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::OutputTotals;

/// Open a monthly production report for a warehouse
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReportInput {
    pub warehouse_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    /// Two-digit month code ("01".."12")
    #[validate(custom = "crate::validation::validate_month_code")]
    pub month: String,
    /// Planned working days, used for the average day norm
    #[validate(range(min = 1, max = 31))]
    pub working_days: Option<i32>,
    #[validate(length(max = 200))]
    pub comment: Option<String>,
}

/// Assign one or more production lines to a report
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignLinesInput {
    #[validate(length(min = 1))]
    pub line_ids: Vec<Uuid>,
}

/// Add a norm target for an order variant on a line of a report
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNormCategoryInput {
    pub production_norm_id: Uuid,
    pub order_id: Uuid,
    pub order_variant_id: Uuid,
    #[validate(range(min = 1))]
    pub norm: i32,
}

/// Re-target an existing norm category
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateNormCategoryInput {
    #[validate(range(min = 1))]
    pub norm: i32,
}

/// Production output for one line, one day, one norm category
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LeafRecordInput {
    /// Daily line instance the output was recorded on
    pub line_id: Uuid,
    pub norm_category_id: Uuid,
    #[validate(range(min = 0, max = 1_000_000))]
    pub sort_1: i32,
    #[validate(range(min = 0, max = 1_000_000))]
    pub sort_2: Option<i32>,
    #[validate(range(min = 0, max = 1_000_000))]
    pub defect_quantity: Option<i32>,
}

impl LeafRecordInput {
    pub fn totals(&self) -> OutputTotals {
        OutputTotals::from_nullable(Some(self.sort_1), self.sort_2, self.defect_quantity)
    }
}

/// Aggregates of every ancestor of a leaf, as written by the rollup pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AncestorTotals {
    pub norm_category: OutputTotals,
    pub production_norm: OutputTotals,
    pub report: OutputTotals,
    pub report_total_norm: i32,
    pub line: OutputTotals,
    pub daily: OutputTotals,
    /// None when no month plan exists for the report's period
    pub month_planing_fact: Option<i32>,
    pub month_planing_order_fact: Option<i32>,
}
