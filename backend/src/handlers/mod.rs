//! HTTP handlers for the Garment Production Management Platform

pub mod health;
pub mod norm_category;
pub mod planning;
pub mod production;
pub mod receipts;
pub mod reports;
pub mod stock;

pub use health::*;
pub use norm_category::*;
pub use planning::*;
pub use production::*;
pub use receipts::*;
pub use reports::*;
pub use stock::*;

use serde::Deserialize;
use uuid::Uuid;

/// Optional warehouse filter shared by list endpoints
#[derive(Debug, Deserialize)]
pub struct WarehouseQuery {
    pub warehouse_id: Option<Uuid>,
}
