//! HTTP handlers for norm categories

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CreateNormCategoryInput, UpdateNormCategoryInput};
use crate::services::norm_category::{NormCategoryService, NormCategoryView};
use crate::AppState;

#[derive(Serialize)]
pub struct DeletedNormCategory {
    pub id: Uuid,
    pub reversed_leaves: usize,
}

pub async fn create_norm_category(
    State(state): State<AppState>,
    Json(input): Json<CreateNormCategoryInput>,
) -> AppResult<(StatusCode, Json<NormCategoryView>)> {
    let service = NormCategoryService::new(state.db);
    let category = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_norm_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<NormCategoryView>> {
    let service = NormCategoryService::new(state.db);
    let category = service.get(id).await?;
    Ok(Json(category))
}

pub async fn update_norm_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateNormCategoryInput>,
) -> AppResult<Json<NormCategoryView>> {
    let service = NormCategoryService::new(state.db);
    let category = service.update_norm(id, input).await?;
    Ok(Json(category))
}

pub async fn delete_norm_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedNormCategory>> {
    let service = NormCategoryService::new(state.db);
    let reversed_leaves = service.delete(id).await?;
    Ok(Json(DeletedNormCategory {
        id,
        reversed_leaves,
    }))
}

/// Every norm category of a report
pub async fn list_report_norm_categories(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<Vec<NormCategoryView>>> {
    let service = NormCategoryService::new(state.db);
    let categories = service.list_for_report(report_id).await?;
    Ok(Json(categories))
}
