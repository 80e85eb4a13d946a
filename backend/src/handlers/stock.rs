//! HTTP handlers for the inventory ledger

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AdjustVariantStockInput, SufficiencyCheckInput};
use crate::services::ledger::{
    AccessoryStock, LedgerService, PackagingOrderTotal, PackagingStockVariant, StockAdjustment,
    SufficiencyReport, VariantStock,
};
use crate::AppState;

/// Apply a signed adjustment to a garment variant bucket
pub async fn adjust_variant_stock(
    State(state): State<AppState>,
    Json(input): Json<AdjustVariantStockInput>,
) -> AppResult<Json<StockAdjustment>> {
    let service = LedgerService::new(state.db);
    let adjustment = service.adjust_variant_stock(input).await?;
    Ok(Json(adjustment))
}

/// Advisory check before increasing a leaf record
pub async fn check_sufficient(
    State(state): State<AppState>,
    Json(input): Json<SufficiencyCheckInput>,
) -> AppResult<Json<SufficiencyReport>> {
    let service = LedgerService::new(state.db);
    let report = service.check_sufficient(input).await?;
    Ok(Json(report))
}

pub async fn list_variant_stock(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<VariantStock>>> {
    let service = LedgerService::new(state.db);
    let rows = service.list_variant_stock(warehouse_id).await?;
    Ok(Json(rows))
}

pub async fn list_accessory_stock(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<AccessoryStock>>> {
    let service = LedgerService::new(state.db);
    let rows = service.list_accessory_stock(warehouse_id).await?;
    Ok(Json(rows))
}

pub async fn list_packaging_stock(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<PackagingStockVariant>>> {
    let service = LedgerService::new(state.db);
    let rows = service.list_packaging_stock(warehouse_id).await?;
    Ok(Json(rows))
}

/// Packaging totals per order
pub async fn packaging_totals_by_order(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<PackagingOrderTotal>>> {
    let service = LedgerService::new(state.db);
    let rows = service.packaging_totals_by_order(warehouse_id).await?;
    Ok(Json(rows))
}
