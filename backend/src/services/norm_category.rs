//! Norm categories: per-variant output targets of a line within a report

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{CreateNormCategoryInput, UpdateNormCategoryInput};
use crate::services::production::{self, LeafScope};
use crate::services::rollup::{self, PeriodKey};

/// Norm category service
#[derive(Clone)]
pub struct NormCategoryService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NormCategory {
    pub id: Uuid,
    pub production_norm_id: Uuid,
    pub order_id: Uuid,
    pub order_variant_id: Uuid,
    pub norm: i32,
    pub total_sort_1: i32,
    pub total_sort_2: i32,
    pub total_defect: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormCategoryView {
    #[serde(flatten)]
    pub category: NormCategory,
    pub percent_done: Decimal,
}

impl From<NormCategory> for NormCategoryView {
    fn from(category: NormCategory) -> Self {
        let fact = i64::from(category.total_sort_1) + i64::from(category.total_sort_2);
        Self {
            percent_done: shared::percent_done(fact, i64::from(category.norm)),
            category,
        }
    }
}

/// Report scope of a production norm
#[derive(Debug, FromRow)]
struct NormScopeRow {
    report_id: Uuid,
    warehouse_id: Uuid,
    year: i32,
    month: String,
}

impl NormScopeRow {
    fn period(&self) -> PeriodKey {
        PeriodKey {
            warehouse_id: self.warehouse_id,
            year: self.year,
            month: self.month.clone(),
        }
    }
}

/// Report scope of a production norm, with the report row locked
async fn norm_scope(conn: &mut PgConnection, production_norm_id: Uuid) -> AppResult<NormScopeRow> {
    let scope = sqlx::query_as::<_, NormScopeRow>(
        r#"
        SELECT r.id AS report_id, r.warehouse_id, r.year, r.month
        FROM production_norms pn
        JOIN production_reports r ON r.id = pn.production_report_id
        WHERE pn.id = $1
        "#,
    )
    .bind(production_norm_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Production norm".to_string()))?;

    production::lock_report(conn, scope.report_id).await?;
    Ok(scope)
}

/// Production norm, report and plan order of a category after a change
async fn recompute_parents(
    conn: &mut PgConnection,
    production_norm_id: Uuid,
    order_id: Uuid,
    scope: &NormScopeRow,
) -> AppResult<()> {
    rollup::recompute_production_norm(conn, production_norm_id).await?;
    rollup::recompute_report(conn, scope.report_id).await?;
    rollup::recompute_month_planing_order(conn, &scope.period(), order_id).await?;
    Ok(())
}

impl NormCategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Add a norm target for an order variant under a production norm
    pub async fn create(&self, input: CreateNormCategoryInput) -> AppResult<NormCategoryView> {
        input.validate()?;
        shared::validate_norm(input.norm)
            .map_err(|msg| AppError::validation("norm", msg, "Norma noldan katta bo'lishi kerak"))?;

        let mut tx = self.db.begin().await?;

        let scope = norm_scope(&mut tx, input.production_norm_id).await?;

        let variant_order: Uuid =
            sqlx::query_scalar("SELECT order_id FROM order_variants WHERE id = $1")
                .bind(input.order_variant_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Order variant".to_string()))?;

        if variant_order != input.order_id {
            return Err(AppError::validation(
                "order_variant_id",
                "Variant does not belong to the order",
                "Variant ushbu buyurtmaga tegishli emas",
            ));
        }

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM norm_categories
                WHERE production_norm_id = $1 AND order_variant_id = $2
            )
            "#,
        )
        .bind(input.production_norm_id)
        .bind(input.order_variant_id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("order variant".to_string()));
        }

        let category = sqlx::query_as::<_, NormCategory>(
            r#"
            INSERT INTO norm_categories (production_norm_id, order_id, order_variant_id, norm)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.production_norm_id)
        .bind(input.order_id)
        .bind(input.order_variant_id)
        .bind(input.norm)
        .fetch_one(&mut *tx)
        .await?;

        recompute_parents(&mut tx, category.production_norm_id, category.order_id, &scope).await?;

        tx.commit().await?;

        tracing::info!(
            norm_category_id = %category.id,
            production_norm_id = %category.production_norm_id,
            norm = category.norm,
            "Norm category created"
        );

        Ok(category.into())
    }

    /// Re-target a norm category
    pub async fn update_norm(
        &self,
        id: Uuid,
        input: UpdateNormCategoryInput,
    ) -> AppResult<NormCategoryView> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current = self.find(&mut tx, id).await?;
        let scope = norm_scope(&mut tx, current.production_norm_id).await?;

        let category = sqlx::query_as::<_, NormCategory>(
            "UPDATE norm_categories SET norm = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(input.norm)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Norm category".to_string()))?;

        recompute_parents(&mut tx, category.production_norm_id, category.order_id, &scope).await?;

        tx.commit().await?;

        Ok(category.into())
    }

    /// Delete a norm category, reversing the stock of its leaves first
    pub async fn delete(&self, id: Uuid) -> AppResult<usize> {
        let mut tx = self.db.begin().await?;

        let category = self.find(&mut tx, id).await?;
        let scope = norm_scope(&mut tx, category.production_norm_id).await?;

        let reversed = production::reverse_leaves(&mut tx, LeafScope::NormCategory(id)).await?;

        sqlx::query("DELETE FROM norm_categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let line_ids: Vec<Uuid> = reversed.line_ids.iter().copied().collect();
        let daily_ids: Vec<Uuid> = reversed.daily_ids.iter().copied().collect();
        rollup::recompute_lines(&mut tx, &line_ids).await?;
        rollup::recompute_dailies(&mut tx, &daily_ids).await?;
        recompute_parents(&mut tx, category.production_norm_id, category.order_id, &scope).await?;
        rollup::recompute_month_planing_fact(&mut tx, &scope.period()).await?;
        rollup::refresh_order_stock(&mut tx, category.order_id).await?;

        tx.commit().await?;

        tracing::info!(norm_category_id = %id, reversed = reversed.count, "Norm category deleted");
        Ok(reversed.count)
    }

    async fn find(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<NormCategory> {
        sqlx::query_as::<_, NormCategory>("SELECT * FROM norm_categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Norm category".to_string()))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<NormCategoryView> {
        let mut conn = self.db.acquire().await?;
        Ok(self.find(&mut conn, id).await?.into())
    }

    pub async fn list_for_report(&self, report_id: Uuid) -> AppResult<Vec<NormCategoryView>> {
        let categories = sqlx::query_as::<_, NormCategory>(
            r#"
            SELECT nc.* FROM norm_categories nc
            JOIN production_norms pn ON pn.id = nc.production_norm_id
            WHERE pn.production_report_id = $1
            ORDER BY pn.production_line_id, nc.order_id, nc.order_variant_id
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        Ok(categories.into_iter().map(NormCategoryView::from).collect())
    }
}
