//! Stock receipt models

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Incoming goods for one warehouse, applied on confirmation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReceiptInput {
    pub warehouse_id: Uuid,
    #[validate(length(max = 120))]
    pub comment: Option<String>,
    #[validate]
    #[serde(default)]
    pub variants: Vec<ReceiptVariantLine>,
    #[validate]
    #[serde(default)]
    pub accessories: Vec<ReceiptAccessoryLine>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiptVariantLine {
    pub order_id: Uuid,
    pub variant_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiptAccessoryLine {
    pub accessory_id: Uuid,
    /// Checked for positivity by the receipt service
    pub quantity: Decimal,
}
