//! HTTP handlers for production reports

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::WarehouseQuery;
use crate::error::AppResult;
use crate::models::{AssignLinesInput, CreateReportInput};
use crate::services::reports::{
    AssignedLine, CategorySummary, Line, ProductionReportView, RemovedLine, ReportDetail,
    ReportService,
};
use crate::AppState;

#[derive(Serialize)]
pub struct DeletedReport {
    pub id: Uuid,
    pub reversed_leaves: usize,
}

/// Open a report with its full calendar
pub async fn create_report(
    State(state): State<AppState>,
    Json(input): Json<CreateReportInput>,
) -> AppResult<(StatusCode, Json<ReportDetail>)> {
    let service = ReportService::new(state.db);
    let report = service.create_report_with_calendar(input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<WarehouseQuery>,
) -> AppResult<Json<Vec<ProductionReportView>>> {
    let service = ReportService::new(state.db);
    let reports = service.list_reports(query.warehouse_id).await?;
    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<ReportDetail>> {
    let service = ReportService::new(state.db);
    let report = service.get_report(report_id).await?;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<DeletedReport>> {
    let service = ReportService::new(state.db);
    let reversed_leaves = service.delete_report(report_id).await?;
    Ok(Json(DeletedReport {
        id: report_id,
        reversed_leaves,
    }))
}

/// Assign production lines to every day of a report
pub async fn assign_lines(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Json(input): Json<AssignLinesInput>,
) -> AppResult<(StatusCode, Json<Vec<AssignedLine>>)> {
    let service = ReportService::new(state.db);
    let assigned = service.assign_lines_to_report(report_id, input).await?;
    Ok((StatusCode::CREATED, Json(assigned)))
}

pub async fn assign_line(
    State(state): State<AppState>,
    Path((report_id, production_line_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<AssignedLine>)> {
    let service = ReportService::new(state.db);
    let assigned = service
        .assign_line_to_report(report_id, production_line_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assigned)))
}

pub async fn remove_line(
    State(state): State<AppState>,
    Path((report_id, production_norm_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<RemovedLine>> {
    let service = ReportService::new(state.db);
    let removed = service
        .remove_line_from_report(report_id, production_norm_id)
        .await?;
    Ok(Json(removed))
}

/// Daily lines of an assigned production norm
pub async fn list_norm_lines(
    State(state): State<AppState>,
    Path(production_norm_id): Path<Uuid>,
) -> AppResult<Json<Vec<Line>>> {
    let service = ReportService::new(state.db);
    let lines = service.list_lines(production_norm_id).await?;
    Ok(Json(lines))
}

pub async fn recompute_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<ProductionReportView>> {
    let service = ReportService::new(state.db);
    let report = service.recompute_report(report_id).await?;
    Ok(Json(report))
}

pub async fn regenerate_category_summaries(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<Vec<CategorySummary>>> {
    let service = ReportService::new(state.db);
    let summaries = service.regenerate_category_summaries(report_id).await?;
    Ok(Json(summaries))
}

pub async fn list_category_summaries(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<Vec<CategorySummary>>> {
    let service = ReportService::new(state.db);
    let summaries = service.list_category_summaries(report_id).await?;
    Ok(Json(summaries))
}
