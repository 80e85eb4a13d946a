//! HTTP handlers for stock receipts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::WarehouseQuery;
use crate::error::AppResult;
use crate::models::CreateReceiptInput;
use crate::services::receipts::{ConfirmOutcome, ReceiptDetail, ReceiptService, StockReceipt};
use crate::AppState;

pub async fn create_receipt(
    State(state): State<AppState>,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<(StatusCode, Json<ReceiptDetail>)> {
    let service = ReceiptService::new(state.db);
    let receipt = service.create_receipt(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<WarehouseQuery>,
) -> AppResult<Json<Vec<StockReceipt>>> {
    let service = ReceiptService::new(state.db);
    let receipts = service.list_receipts(query.warehouse_id).await?;
    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReceiptDetail>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.get_receipt(id).await?;
    Ok(Json(receipt))
}

/// Confirm a receipt; confirming twice applies it once
pub async fn confirm_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConfirmOutcome>> {
    let service = ReceiptService::new(state.db);
    let outcome = service.confirm_receipt(id).await?;
    Ok(Json(outcome))
}
