//! Stock receipts: incoming garments and accessories for a warehouse

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{CreateReceiptInput, StockBucket};
use crate::services::{ledger, rollup};

/// Receipt service
#[derive(Clone)]
pub struct ReceiptService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockReceipt {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub comment: Option<String>,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockReceiptVariant {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockReceiptAccessory {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub accessory_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptDetail {
    pub receipt: StockReceipt,
    pub variants: Vec<StockReceiptVariant>,
    pub accessories: Vec<StockReceiptAccessory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub receipt: StockReceipt,
    /// False when the receipt had already been confirmed
    pub applied: bool,
}

async fn receipt_lines(
    conn: &mut PgConnection,
    receipt_id: Uuid,
) -> AppResult<(Vec<StockReceiptVariant>, Vec<StockReceiptAccessory>)> {
    let variants = sqlx::query_as::<_, StockReceiptVariant>(
        "SELECT * FROM stock_receipt_variants WHERE receipt_id = $1 ORDER BY order_id, variant_id",
    )
    .bind(receipt_id)
    .fetch_all(&mut *conn)
    .await?;

    let accessories = sqlx::query_as::<_, StockReceiptAccessory>(
        "SELECT * FROM stock_receipt_accessories WHERE receipt_id = $1 ORDER BY accessory_id",
    )
    .bind(receipt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok((variants, accessories))
}

impl ReceiptService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_receipt(&self, input: CreateReceiptInput) -> AppResult<ReceiptDetail> {
        input.validate()?;

        if input.variants.is_empty() && input.accessories.is_empty() {
            return Err(AppError::validation(
                "variants",
                "A receipt needs at least one line",
                "Kirim kamida bitta qatordan iborat bo'lishi kerak",
            ));
        }
        if input.accessories.iter().any(|a| a.quantity <= Decimal::ZERO) {
            return Err(AppError::validation(
                "accessories",
                "Accessory quantity must be greater than zero",
                "Aksessuar miqdori noldan katta bo'lishi kerak",
            ));
        }

        let mut tx = self.db.begin().await?;

        let receipt = sqlx::query_as::<_, StockReceipt>(
            "INSERT INTO stock_receipts (warehouse_id, comment) VALUES ($1, $2) RETURNING *",
        )
        .bind(input.warehouse_id)
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.variants {
            let variant_order: Option<Uuid> =
                sqlx::query_scalar("SELECT order_id FROM order_variants WHERE id = $1")
                    .bind(line.variant_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match variant_order {
                None => return Err(AppError::NotFound("Order variant".to_string())),
                Some(order_id) if order_id != line.order_id => {
                    return Err(AppError::validation(
                        "variants",
                        "Variant does not belong to the order",
                        "Variant ushbu buyurtmaga tegishli emas",
                    ));
                }
                Some(_) => {}
            }

            sqlx::query(
                r#"
                INSERT INTO stock_receipt_variants (receipt_id, order_id, variant_id, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(receipt.id)
            .bind(line.order_id)
            .bind(line.variant_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        for line in &input.accessories {
            sqlx::query(
                r#"
                INSERT INTO stock_receipt_accessories (receipt_id, accessory_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(receipt.id)
            .bind(line.accessory_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let (variants, accessories) = receipt_lines(&mut tx, receipt.id).await?;
        tx.commit().await?;

        Ok(ReceiptDetail {
            receipt,
            variants,
            accessories,
        })
    }

    /// Add every line of a receipt to its bucket, exactly once
    pub async fn confirm_receipt(&self, id: Uuid) -> AppResult<ConfirmOutcome> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query_as::<_, StockReceipt>(
            r#"
            UPDATE stock_receipts
            SET confirmed = TRUE, confirmed_at = NOW()
            WHERE id = $1 AND confirmed = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let receipt = match claimed {
            Some(receipt) => receipt,
            None => {
                let receipt = sqlx::query_as::<_, StockReceipt>(
                    "SELECT * FROM stock_receipts WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Stock receipt".to_string()))?;

                tracing::debug!(receipt_id = %id, "Receipt already confirmed");
                return Ok(ConfirmOutcome {
                    receipt,
                    applied: false,
                });
            }
        };

        let (variants, accessories) = receipt_lines(&mut tx, id).await?;

        let mut orders = BTreeSet::new();
        for line in &variants {
            let bucket = StockBucket {
                order_id: line.order_id,
                variant_id: line.variant_id,
                warehouse_id: receipt.warehouse_id,
            };
            ledger::apply_variant_delta(&mut tx, &bucket, line.quantity).await?;
            orders.insert(line.order_id);
        }

        for line in &accessories {
            ledger::apply_accessory_delta(
                &mut tx,
                line.accessory_id,
                receipt.warehouse_id,
                line.quantity,
            )
            .await?;
        }

        for order_id in &orders {
            rollup::refresh_order_stock(&mut tx, *order_id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            receipt_id = %id,
            variants = variants.len(),
            accessories = accessories.len(),
            "Stock receipt confirmed"
        );

        Ok(ConfirmOutcome {
            receipt,
            applied: true,
        })
    }

    pub async fn get_receipt(&self, id: Uuid) -> AppResult<ReceiptDetail> {
        let mut conn = self.db.acquire().await?;

        let receipt = sqlx::query_as::<_, StockReceipt>("SELECT * FROM stock_receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock receipt".to_string()))?;

        let (variants, accessories) = receipt_lines(&mut conn, id).await?;

        Ok(ReceiptDetail {
            receipt,
            variants,
            accessories,
        })
    }

    pub async fn list_receipts(&self, warehouse_id: Option<Uuid>) -> AppResult<Vec<StockReceipt>> {
        let receipts = sqlx::query_as::<_, StockReceipt>(
            r#"
            SELECT * FROM stock_receipts
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(receipts)
    }
}
