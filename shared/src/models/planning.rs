//! Monthly planning models

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMonthPlaningInput {
    pub warehouse_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(custom = "crate::validation::validate_month_code")]
    pub month: String,
    #[validate(length(min = 1, max = 100))]
    pub day_planing: String,
    #[validate(length(max = 100))]
    pub comment: Option<String>,
}

/// Planned quantity of one order inside a month plan
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MonthPlaningOrderInput {
    pub order_id: Uuid,
    #[validate(range(min = 0))]
    pub planed_quantity: i32,
    #[validate(length(max = 100))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateMonthPlaningOrderInput {
    #[validate(range(min = 0))]
    pub planed_quantity: i32,
    #[validate(length(max = 100))]
    pub comment: Option<String>,
}
