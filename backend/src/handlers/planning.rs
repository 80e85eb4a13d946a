//! HTTP handlers for monthly planning

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::WarehouseQuery;
use crate::error::AppResult;
use crate::models::{CreateMonthPlaningInput, MonthPlaningOrderInput, UpdateMonthPlaningOrderInput};
use crate::services::planning::{
    MonthPlaningDetail, MonthPlaningOrderView, MonthPlaningView, PlanningService,
};
use crate::AppState;

#[derive(Serialize)]
pub struct RefreshResponse {
    pub refreshed: u64,
}

pub async fn create_month_planing(
    State(state): State<AppState>,
    Json(input): Json<CreateMonthPlaningInput>,
) -> AppResult<(StatusCode, Json<MonthPlaningView>)> {
    let service = PlanningService::new(state.db);
    let plan = service.create_plan(input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn list_month_planings(
    State(state): State<AppState>,
    Query(query): Query<WarehouseQuery>,
) -> AppResult<Json<Vec<MonthPlaningView>>> {
    let service = PlanningService::new(state.db);
    let plans = service.list_plans(query.warehouse_id).await?;
    Ok(Json(plans))
}

pub async fn get_month_planing(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<MonthPlaningDetail>> {
    let service = PlanningService::new(state.db);
    let plan = service.get_plan(plan_id).await?;
    Ok(Json(plan))
}

pub async fn refresh_month_planing(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<MonthPlaningDetail>> {
    let service = PlanningService::new(state.db);
    let plan = service.refresh_plan(plan_id).await?;
    Ok(Json(plan))
}

pub async fn add_month_planing_order(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<MonthPlaningOrderInput>,
) -> AppResult<(StatusCode, Json<MonthPlaningOrderView>)> {
    let service = PlanningService::new(state.db);
    let row = service.add_order(plan_id, input).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_month_planing_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMonthPlaningOrderInput>,
) -> AppResult<Json<MonthPlaningOrderView>> {
    let service = PlanningService::new(state.db);
    let row = service.update_order(id, input).await?;
    Ok(Json(row))
}

pub async fn delete_month_planing_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = PlanningService::new(state.db);
    service.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Refresh the plan stock quantity of one order
pub async fn refresh_order_stock(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<RefreshResponse>> {
    let service = PlanningService::new(state.db);
    let refreshed = service.refresh_stock_quantity(order_id).await?;
    Ok(Json(RefreshResponse { refreshed }))
}

pub async fn refresh_all_month_planing_orders(
    State(state): State<AppState>,
) -> AppResult<Json<RefreshResponse>> {
    let service = PlanningService::new(state.db);
    let refreshed = service.refresh_all_month_planing_orders().await?;
    Ok(Json(RefreshResponse { refreshed }))
}
