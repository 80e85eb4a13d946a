//! Error handling for the Garment Production Management Platform
//!
//! Provides consistent error responses in English and Uzbek

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::BucketKind;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_uz: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Insufficient {} stock for {bucket}: available {available}, required {required}", .kind.as_str())]
    InsufficientStock {
        kind: BucketKind,
        bucket: String,
        available: Decimal,
        required: Decimal,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: &str, message: &str, message_uz: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_uz: message_uz.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_uz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_uz: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_uz,
            field: None,
            details: None,
        }
    }
}

/// Translate storage constraint failures; everything else stays generic
fn database_error_detail(err: &sqlx::Error) -> (StatusCode, ErrorDetail) {
    if let sqlx::Error::Database(db_err) = err {
        let constraint = db_err.constraint().map(str::to_string);
        if db_err.is_unique_violation() {
            let mut detail = ErrorDetail::new(
                "DUPLICATE_ENTRY",
                "A record with these values already exists".to_string(),
                "Bunday yozuv allaqachon mavjud".to_string(),
            );
            detail.field = constraint;
            return (StatusCode::CONFLICT, detail);
        }
        if db_err.is_check_violation() {
            let mut detail = ErrorDetail::new(
                "CONSTRAINT_VIOLATION",
                "The change would leave a quantity below zero".to_string(),
                "O'zgarish miqdorni noldan pastga tushiradi".to_string(),
            );
            detail.field = constraint;
            return (StatusCode::UNPROCESSABLE_ENTITY, detail);
        }
        if db_err.is_foreign_key_violation() {
            let mut detail = ErrorDetail::new(
                "MISSING_RELATION",
                "A referenced record does not exist".to_string(),
                "Bog'langan yozuv topilmadi".to_string(),
            );
            detail.field = constraint;
            return (StatusCode::UNPROCESSABLE_ENTITY, detail);
        }
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorDetail::new(
            "DATABASE_ERROR",
            "A database error occurred".to_string(),
            "Ma'lumotlar bazasida xatolik yuz berdi".to_string(),
        ),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation {
                field,
                message,
                message_uz,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_uz.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Ma'lumot noto'g'ri: {}", msg),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                        format!("Bu {} allaqachon mavjud", field),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} topilmadi", resource),
                ),
            ),
            AppError::InsufficientStock {
                kind,
                bucket,
                available,
                required,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    field: Some(kind.as_str().to_string()),
                    details: Some(serde_json::json!({
                        "bucket": bucket,
                        "available": available,
                        "required": required,
                        "missing": (*required - *available).max(Decimal::ZERO),
                    })),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_STOCK",
                        format!(
                            "Not enough {} stock for {}. Available: {}, required: {}",
                            kind.as_str(),
                            bucket,
                            available,
                            required
                        ),
                        format!(
                            "Omborda yetarli mahsulot yo'q: {}. Qoldiq: {}, kerak: {}",
                            bucket, available, required
                        ),
                    )
                },
            ),
            AppError::DatabaseError(err) => database_error_detail(err),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Serverda ichki xatolik yuz berdi".to_string(),
                ),
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
