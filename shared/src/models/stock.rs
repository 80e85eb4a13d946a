//! Stock bucket models

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Key of one garment-variant stock counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockBucket {
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub warehouse_id: Uuid,
}

impl std::fmt::Display for StockBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order {} / variant {} @ warehouse {}",
            self.order_id, self.variant_id, self.warehouse_id
        )
    }
}

/// Ledger counters that can refuse a decrease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    Variant,
    Accessory,
}

impl BucketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Variant => "variant",
            BucketKind::Accessory => "accessory",
        }
    }
}

/// Manual signed adjustment of a variant bucket
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustVariantStockInput {
    pub order_variant_id: Uuid,
    pub warehouse_id: Uuid,
    /// Positive receives stock, negative takes it out
    pub delta: i32,
}

/// Advisory pre-check for a planned leaf increase
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SufficiencyCheckInput {
    pub line_id: Uuid,
    pub norm_category_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}
