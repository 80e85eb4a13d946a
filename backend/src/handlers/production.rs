//! HTTP handlers for production leaf records

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::LeafRecordInput;
use crate::services::production::{LeafDeleteResult, LeafRecord, LeafWriteResult, ProductionService};
use crate::AppState;

/// Create or update the output of a line for one norm category
pub async fn upsert_leaf_record(
    State(state): State<AppState>,
    Json(input): Json<LeafRecordInput>,
) -> AppResult<Json<LeafWriteResult>> {
    let service = ProductionService::new(state.db);
    let result = service.upsert_leaf_record(input).await?;
    Ok(Json(result))
}

pub async fn get_leaf_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LeafRecord>> {
    let service = ProductionService::new(state.db);
    let record = service.get_leaf_record(id).await?;
    Ok(Json(record))
}

pub async fn delete_leaf_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LeafDeleteResult>> {
    let service = ProductionService::new(state.db);
    let result = service.delete_leaf_record(id).await?;
    Ok(Json(result))
}

/// Leaf records of one daily line
pub async fn list_line_leaf_records(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
) -> AppResult<Json<Vec<LeafRecord>>> {
    let service = ProductionService::new(state.db);
    let records = service.list_for_line(line_id).await?;
    Ok(Json(records))
}
