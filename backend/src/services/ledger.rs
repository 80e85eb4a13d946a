//! Inventory ledger: garment variant, accessory and packaging stock
//!
//! Every move is a single server-side statement. Increases upsert the bucket,
//! decreases are conditional (`quantity + delta >= 0`) so a shortfall comes
//! back as [`AppError::InsufficientStock`] and the check constraints on the
//! stock tables only act as a backstop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{AdjustVariantStockInput, BucketKind, StockBucket, SufficiencyCheckInput};
use crate::services::{production, rollup};
use shared::{AccessoryRatio, PackagingDelta, StockPlan};

/// Ledger service for stock buckets
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

/// Garment variant stock row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VariantStock {
    pub id: Uuid,
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// Accessory stock row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccessoryStock {
    pub id: Uuid,
    pub accessory_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Packaged output per grade
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PackagingStockVariant {
    pub id: Uuid,
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub sort_1: i32,
    pub sort_2: i32,
    pub updated_at: DateTime<Utc>,
}

/// Packaging totals of one order across its variants
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PackagingOrderTotal {
    pub order_id: Uuid,
    pub sort_1: i64,
    pub sort_2: i64,
}

/// Accessory bucket after a move
#[derive(Debug, Clone, Serialize)]
pub struct AccessoryBalance {
    pub accessory_id: Uuid,
    pub delta: Decimal,
    pub quantity: Decimal,
}

/// Result of a manual variant adjustment
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustment {
    pub bucket: StockBucket,
    pub delta: i32,
    pub quantity: i32,
    pub accessories: Vec<AccessoryBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessoryRequirement {
    pub accessory_id: Uuid,
    pub available: Decimal,
    pub required: Decimal,
}

/// Outcome of an advisory sufficiency check that passed
#[derive(Debug, Clone, Serialize)]
pub struct SufficiencyReport {
    pub bucket: StockBucket,
    pub available: i32,
    pub required: i32,
    pub accessories: Vec<AccessoryRequirement>,
}

#[derive(Debug, FromRow)]
struct AccessoryRatioRow {
    accessory_id: Uuid,
    ratio: Decimal,
}

fn accessory_bucket_label(accessory_id: Uuid, warehouse_id: Uuid) -> String {
    format!("accessory {} @ warehouse {}", accessory_id, warehouse_id)
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// Current quantity of a variant bucket; a missing row counts as zero
pub(crate) async fn variant_quantity(
    conn: &mut PgConnection,
    bucket: &StockBucket,
) -> AppResult<i32> {
    let quantity: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT quantity FROM variant_stocks
        WHERE order_id = $1 AND warehouse_id = $2 AND variant_id = $3
        "#,
    )
    .bind(bucket.order_id)
    .bind(bucket.warehouse_id)
    .bind(bucket.variant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

pub(crate) async fn accessory_quantity(
    conn: &mut PgConnection,
    accessory_id: Uuid,
    warehouse_id: Uuid,
) -> AppResult<Decimal> {
    let quantity: Option<Decimal> = sqlx::query_scalar(
        "SELECT quantity FROM accessory_stocks WHERE accessory_id = $1 AND warehouse_id = $2",
    )
    .bind(accessory_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(Decimal::ZERO))
}

/// Apply a signed delta to a variant bucket and return the new quantity
pub(crate) async fn apply_variant_delta(
    conn: &mut PgConnection,
    bucket: &StockBucket,
    delta: i32,
) -> AppResult<i32> {
    if delta == 0 {
        return variant_quantity(conn, bucket).await;
    }

    if delta > 0 {
        let quantity: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO variant_stocks (order_id, warehouse_id, variant_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id, warehouse_id, variant_id)
            DO UPDATE SET quantity = variant_stocks.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(bucket.order_id)
        .bind(bucket.warehouse_id)
        .bind(bucket.variant_id)
        .bind(delta)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(bucket = %bucket, delta, quantity, "Variant stock increased");
        return Ok(quantity);
    }

    let updated: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE variant_stocks
        SET quantity = quantity + $4, updated_at = NOW()
        WHERE order_id = $1 AND warehouse_id = $2 AND variant_id = $3
          AND quantity + $4 >= 0
        RETURNING quantity
        "#,
    )
    .bind(bucket.order_id)
    .bind(bucket.warehouse_id)
    .bind(bucket.variant_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    match updated {
        Some(quantity) => {
            tracing::debug!(bucket = %bucket, delta, quantity, "Variant stock decreased");
            Ok(quantity)
        }
        None => {
            let available = variant_quantity(conn, bucket).await?;
            Err(AppError::InsufficientStock {
                kind: BucketKind::Variant,
                bucket: bucket.to_string(),
                available: Decimal::from(available),
                required: Decimal::from(-delta),
            })
        }
    }
}

/// Apply a signed delta to an accessory bucket and return the new quantity
pub(crate) async fn apply_accessory_delta(
    conn: &mut PgConnection,
    accessory_id: Uuid,
    warehouse_id: Uuid,
    delta: Decimal,
) -> AppResult<Decimal> {
    if delta.is_zero() {
        return accessory_quantity(conn, accessory_id, warehouse_id).await;
    }

    if delta.is_sign_positive() {
        let quantity: Decimal = sqlx::query_scalar(
            r#"
            INSERT INTO accessory_stocks (accessory_id, warehouse_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (accessory_id, warehouse_id)
            DO UPDATE SET quantity = accessory_stocks.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(accessory_id)
        .bind(warehouse_id)
        .bind(delta)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(%accessory_id, %warehouse_id, %delta, %quantity, "Accessory stock increased");
        return Ok(quantity);
    }

    let updated: Option<Decimal> = sqlx::query_scalar(
        r#"
        UPDATE accessory_stocks
        SET quantity = quantity + $3, updated_at = NOW()
        WHERE accessory_id = $1 AND warehouse_id = $2
          AND quantity + $3 >= 0
        RETURNING quantity
        "#,
    )
    .bind(accessory_id)
    .bind(warehouse_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    match updated {
        Some(quantity) => {
            tracing::debug!(%accessory_id, %warehouse_id, %delta, %quantity, "Accessory stock decreased");
            Ok(quantity)
        }
        None => Err(AppError::InsufficientStock {
            kind: BucketKind::Accessory,
            bucket: accessory_bucket_label(accessory_id, warehouse_id),
            available: accessory_quantity(conn, accessory_id, warehouse_id).await?,
            required: -delta,
        }),
    }
}

/// Move packaged output by grade; packaging clamps at zero instead of failing
pub(crate) async fn adjust_packaging(
    conn: &mut PgConnection,
    bucket: &StockBucket,
    delta: PackagingDelta,
) -> AppResult<Option<PackagingStockVariant>> {
    if delta.is_zero() {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, PackagingStockVariant>(
        r#"
        INSERT INTO packaging_stock_variants (order_id, warehouse_id, variant_id, sort_1, sort_2)
        VALUES ($1, $2, $3, GREATEST($4, 0), GREATEST($5, 0))
        ON CONFLICT (order_id, warehouse_id, variant_id)
        DO UPDATE SET sort_1 = GREATEST(packaging_stock_variants.sort_1 + $4, 0),
                      sort_2 = GREATEST(packaging_stock_variants.sort_2 + $5, 0),
                      updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(bucket.order_id)
    .bind(bucket.warehouse_id)
    .bind(bucket.variant_id)
    .bind(delta.sort_1)
    .bind(delta.sort_2)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        bucket = %bucket,
        sort_1 = delta.sort_1,
        sort_2 = delta.sort_2,
        "Packaging stock adjusted"
    );
    Ok(Some(row))
}

/// Accessory consumption ratios for the article behind an order
pub(crate) async fn load_accessory_ratios(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Vec<AccessoryRatio>> {
    // Ordered by accessory so concurrent writers lock buckets in the same order
    let rows = sqlx::query_as::<_, AccessoryRatioRow>(
        r#"
        SELECT aa.accessory_id, aa.quantity AS ratio
        FROM article_accessories aa
        JOIN orders o ON o.article_id = aa.article_id
        WHERE o.id = $1
        ORDER BY aa.accessory_id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| AccessoryRatio {
            accessory_id: r.accessory_id,
            ratio: r.ratio,
        })
        .collect())
}

/// Apply every move of a leaf's stock plan: variant, accessories, packaging
pub(crate) async fn apply_stock_plan(
    conn: &mut PgConnection,
    bucket: &StockBucket,
    plan: &StockPlan,
) -> AppResult<()> {
    apply_variant_delta(conn, bucket, plan.variant_delta).await?;
    for accessory in &plan.accessory_moves {
        apply_accessory_delta(conn, accessory.accessory_id, bucket.warehouse_id, accessory.delta)
            .await?;
    }
    adjust_packaging(conn, bucket, plan.packaging).await?;
    Ok(())
}

impl LedgerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Signed manual adjustment of a variant bucket, with the linked
    /// accessories moved by ratio in the same transaction
    pub async fn adjust_variant_stock(
        &self,
        input: AdjustVariantStockInput,
    ) -> AppResult<StockAdjustment> {
        shared::validate_adjustment_delta(input.delta).map_err(|msg| {
            AppError::validation("delta", msg, "O'zgarish miqdori nolga teng bo'lmasligi kerak")
        })?;

        let mut tx = self.db.begin().await?;

        let order_id: Uuid = sqlx::query_scalar("SELECT order_id FROM order_variants WHERE id = $1")
            .bind(input.order_variant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Order variant".to_string()))?;

        let bucket = StockBucket {
            order_id,
            variant_id: input.order_variant_id,
            warehouse_id: input.warehouse_id,
        };

        let quantity = apply_variant_delta(&mut tx, &bucket, input.delta).await?;

        let ratios = load_accessory_ratios(&mut tx, order_id).await?;
        let mut accessories = Vec::new();
        for accessory in shared::accessory_moves(&ratios, input.delta) {
            let balance = apply_accessory_delta(
                &mut tx,
                accessory.accessory_id,
                bucket.warehouse_id,
                accessory.delta,
            )
            .await?;
            accessories.push(AccessoryBalance {
                accessory_id: accessory.accessory_id,
                delta: accessory.delta,
                quantity: balance,
            });
        }

        rollup::refresh_order_stock(&mut tx, order_id).await?;

        tx.commit().await?;

        tracing::info!(bucket = %bucket, delta = input.delta, quantity, "Variant stock adjusted");

        Ok(StockAdjustment {
            bucket,
            delta: input.delta,
            quantity,
            accessories,
        })
    }

    /// Advisory check that a leaf can consume `quantity` more garments.
    ///
    /// Nothing is locked; the conditional decrement at write time is what
    /// actually guards the bucket.
    pub async fn check_sufficient(
        &self,
        input: SufficiencyCheckInput,
    ) -> AppResult<SufficiencyReport> {
        input.validate()?;

        let mut conn = self.db.acquire().await?;
        let ctx =
            production::load_leaf_context(&mut conn, input.line_id, input.norm_category_id, false)
                .await?;
        let bucket = ctx.bucket();

        let available = variant_quantity(&mut conn, &bucket).await?;
        shared::check_available(Decimal::from(available), Decimal::from(input.quantity)).map_err(
            |shortfall| AppError::InsufficientStock {
                kind: BucketKind::Variant,
                bucket: bucket.to_string(),
                available: shortfall.available,
                required: shortfall.required,
            },
        )?;

        let ratios = load_accessory_ratios(&mut conn, ctx.order_id).await?;
        let mut accessories = Vec::new();
        for ratio in ratios.iter().filter(|r| !r.ratio.is_zero()) {
            let required = shared::scaled_accessory_delta(ratio.ratio, input.quantity);
            let available =
                accessory_quantity(&mut conn, ratio.accessory_id, bucket.warehouse_id).await?;
            shared::check_available(available, required).map_err(|shortfall| {
                AppError::InsufficientStock {
                    kind: BucketKind::Accessory,
                    bucket: accessory_bucket_label(ratio.accessory_id, bucket.warehouse_id),
                    available: shortfall.available,
                    required: shortfall.required,
                }
            })?;
            accessories.push(AccessoryRequirement {
                accessory_id: ratio.accessory_id,
                available,
                required,
            });
        }

        Ok(SufficiencyReport {
            bucket,
            available,
            required: input.quantity,
            accessories,
        })
    }

    pub async fn list_variant_stock(&self, warehouse_id: Uuid) -> AppResult<Vec<VariantStock>> {
        let rows = sqlx::query_as::<_, VariantStock>(
            r#"
            SELECT * FROM variant_stocks
            WHERE warehouse_id = $1
            ORDER BY order_id, variant_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn list_accessory_stock(&self, warehouse_id: Uuid) -> AppResult<Vec<AccessoryStock>> {
        let rows = sqlx::query_as::<_, AccessoryStock>(
            "SELECT * FROM accessory_stocks WHERE warehouse_id = $1 ORDER BY accessory_id",
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn list_packaging_stock(
        &self,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<PackagingStockVariant>> {
        let rows = sqlx::query_as::<_, PackagingStockVariant>(
            r#"
            SELECT * FROM packaging_stock_variants
            WHERE warehouse_id = $1
            ORDER BY order_id, variant_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Packaging sort 1 / sort 2 per order for a warehouse
    pub async fn packaging_totals_by_order(
        &self,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<PackagingOrderTotal>> {
        let rows = sqlx::query_as::<_, PackagingOrderTotal>(
            r#"
            SELECT order_id,
                   COALESCE(SUM(sort_1), 0)::BIGINT AS sort_1,
                   COALESCE(SUM(sort_2), 0)::BIGINT AS sort_2
            FROM packaging_stock_variants
            WHERE warehouse_id = $1
            GROUP BY order_id
            ORDER BY order_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
