//! Route definitions for the Garment Production Management Platform

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Inventory ledger
        .nest("/stock", stock_routes())
        // Production reports and their calendars
        .nest("/reports", report_routes())
        .nest("/production-norms", production_norm_routes())
        .nest("/norm-categories", norm_category_routes())
        // Leaf records
        .nest("/line-orders", line_order_routes())
        .route("/lines/:line_id/orders", get(handlers::list_line_leaf_records))
        // Monthly planning
        .nest("/month-planings", month_planing_routes())
        .nest("/month-planing-orders", month_planing_order_routes())
        .route("/orders/:order_id/refresh-stock", post(handlers::refresh_order_stock))
        .route(
            "/planning/refresh-orders",
            post(handlers::refresh_all_month_planing_orders),
        )
        // Stock receipts
        .nest("/receipts", receipt_routes())
}

/// Stock ledger routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/variants/adjust", post(handlers::adjust_variant_stock))
        .route("/check", post(handlers::check_sufficient))
        .route("/variants/:warehouse_id", get(handlers::list_variant_stock))
        .route("/accessories/:warehouse_id", get(handlers::list_accessory_stock))
        .route("/packaging/:warehouse_id", get(handlers::list_packaging_stock))
        .route(
            "/packaging/:warehouse_id/orders",
            get(handlers::packaging_totals_by_order),
        )
}

/// Production report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_reports).post(handlers::create_report))
        .route(
            "/:report_id",
            get(handlers::get_report).delete(handlers::delete_report),
        )
        .route("/:report_id/lines", post(handlers::assign_lines))
        .route(
            "/:report_id/lines/:production_line_id",
            post(handlers::assign_line),
        )
        .route(
            "/:report_id/production-norms/:production_norm_id",
            delete(handlers::remove_line),
        )
        .route(
            "/:report_id/norm-categories",
            get(handlers::list_report_norm_categories),
        )
        .route("/:report_id/recompute", post(handlers::recompute_report))
        .route(
            "/:report_id/category-summaries",
            get(handlers::list_category_summaries).post(handlers::regenerate_category_summaries),
        )
}

fn production_norm_routes() -> Router<AppState> {
    Router::new().route("/:production_norm_id/lines", get(handlers::list_norm_lines))
}

/// Norm category routes
fn norm_category_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_norm_category))
        .route(
            "/:id",
            get(handlers::get_norm_category)
                .put(handlers::update_norm_category)
                .delete(handlers::delete_norm_category),
        )
}

/// Leaf record routes
fn line_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", put(handlers::upsert_leaf_record))
        .route(
            "/:id",
            get(handlers::get_leaf_record).delete(handlers::delete_leaf_record),
        )
}

/// Month planning routes
fn month_planing_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_month_planings).post(handlers::create_month_planing),
        )
        .route("/:plan_id", get(handlers::get_month_planing))
        .route("/:plan_id/orders", post(handlers::add_month_planing_order))
        .route("/:plan_id/refresh", post(handlers::refresh_month_planing))
}

fn month_planing_order_routes() -> Router<AppState> {
    Router::new().route(
        "/:id",
        put(handlers::update_month_planing_order).delete(handlers::delete_month_planing_order),
    )
}

/// Stock receipt routes
fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_receipts).post(handlers::create_receipt))
        .route("/:id", get(handlers::get_receipt))
        .route("/:id/confirm", post(handlers::confirm_receipt))
}
