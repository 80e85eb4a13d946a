//! Monthly production planning

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{CreateMonthPlaningInput, MonthPlaningOrderInput, UpdateMonthPlaningOrderInput};
use crate::services::rollup::{self, PeriodKey};

/// Planning service for month plans and their order rows
#[derive(Clone)]
pub struct PlanningService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthPlaning {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub year: i32,
    pub month: String,
    pub comment: Option<String>,
    pub day_planing: String,
    pub planing_quantity: i32,
    pub fact_quantity: i32,
}

impl MonthPlaning {
    fn period_key(&self) -> PeriodKey {
        PeriodKey {
            warehouse_id: self.warehouse_id,
            year: self.year,
            month: self.month.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthPlaningOrder {
    pub id: Uuid,
    pub month_planing_id: Uuid,
    pub order_id: Uuid,
    pub planed_quantity: i32,
    pub stock_quantity: i32,
    pub fact_quantity: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthPlaningView {
    #[serde(flatten)]
    pub plan: MonthPlaning,
    pub percent_done: Decimal,
}

impl From<MonthPlaning> for MonthPlaningView {
    fn from(plan: MonthPlaning) -> Self {
        Self {
            percent_done: shared::percent_done(
                i64::from(plan.fact_quantity),
                i64::from(plan.planing_quantity),
            ),
            plan,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthPlaningOrderView {
    #[serde(flatten)]
    pub order: MonthPlaningOrder,
    pub percent_done: Decimal,
}

impl From<MonthPlaningOrder> for MonthPlaningOrderView {
    fn from(order: MonthPlaningOrder) -> Self {
        Self {
            percent_done: shared::percent_done(
                i64::from(order.fact_quantity),
                i64::from(order.planed_quantity),
            ),
            order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthPlaningDetail {
    pub plan: MonthPlaningView,
    pub orders: Vec<MonthPlaningOrderView>,
}

async fn find_plan(conn: &mut PgConnection, id: Uuid, lock: bool) -> AppResult<MonthPlaning> {
    let sql = if lock {
        "SELECT * FROM month_planings WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM month_planings WHERE id = $1"
    };
    sqlx::query_as::<_, MonthPlaning>(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Month plan".to_string()))
}

async fn find_plan_order(conn: &mut PgConnection, id: Uuid) -> AppResult<MonthPlaningOrder> {
    sqlx::query_as::<_, MonthPlaningOrder>("SELECT * FROM month_planing_orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Month plan order".to_string()))
}

impl PlanningService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_plan(&self, input: CreateMonthPlaningInput) -> AppResult<MonthPlaningView> {
        input.validate()?;
        let period = shared::validate_period(input.year, &input.month)
            .map_err(|msg| AppError::validation("month", msg, "Oy noto'g'ri ko'rsatilgan"))?;

        let mut tx = self.db.begin().await?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM month_planings
                WHERE warehouse_id = $1 AND year = $2 AND month = $3
            )
            "#,
        )
        .bind(input.warehouse_id)
        .bind(period.year)
        .bind(period.month_code())
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("plan period".to_string()));
        }

        let plan = sqlx::query_as::<_, MonthPlaning>(
            r#"
            INSERT INTO month_planings (warehouse_id, year, month, comment, day_planing)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.warehouse_id)
        .bind(period.year)
        .bind(period.month_code())
        .bind(&input.comment)
        .bind(&input.day_planing)
        .fetch_one(&mut *tx)
        .await?;

        // The period may already have production
        rollup::recompute_month_planing_fact(&mut tx, &plan.period_key()).await?;
        let plan = find_plan(&mut tx, plan.id, false).await?;

        tx.commit().await?;

        tracing::info!(plan_id = %plan.id, period = %period, "Month plan created");
        Ok(plan.into())
    }

    /// Add an order to a plan and refresh its fact and stock
    pub async fn add_order(
        &self,
        plan_id: Uuid,
        input: MonthPlaningOrderInput,
    ) -> AppResult<MonthPlaningOrderView> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let plan = find_plan(&mut tx, plan_id, true).await?;

        let order_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
                .bind(input.order_id)
                .fetch_one(&mut *tx)
                .await?;
        if !order_exists {
            return Err(AppError::NotFound("Order".to_string()));
        }

        let duplicate: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM month_planing_orders
                WHERE month_planing_id = $1 AND order_id = $2
            )
            "#,
        )
        .bind(plan_id)
        .bind(input.order_id)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(AppError::DuplicateEntry("order".to_string()));
        }

        let row = sqlx::query_as::<_, MonthPlaningOrder>(
            r#"
            INSERT INTO month_planing_orders (month_planing_id, order_id, planed_quantity, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(plan_id)
        .bind(input.order_id)
        .bind(input.planed_quantity)
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await?;

        rollup::recompute_planing_quantity(&mut tx, plan_id).await?;
        rollup::recompute_month_planing_order(&mut tx, &plan.period_key(), row.order_id).await?;
        let row = find_plan_order(&mut tx, row.id).await?;

        tx.commit().await?;

        tracing::debug!(%plan_id, order_id = %row.order_id, "Order added to month plan");
        Ok(row.into())
    }

    pub async fn update_order(
        &self,
        id: Uuid,
        input: UpdateMonthPlaningOrderInput,
    ) -> AppResult<MonthPlaningOrderView> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, MonthPlaningOrder>(
            r#"
            UPDATE month_planing_orders
            SET planed_quantity = $2, comment = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.planed_quantity)
        .bind(&input.comment)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Month plan order".to_string()))?;

        let plan = find_plan(&mut tx, row.month_planing_id, false).await?;
        rollup::recompute_planing_quantity(&mut tx, plan.id).await?;
        rollup::recompute_month_planing_order(&mut tx, &plan.period_key(), row.order_id).await?;
        let row = find_plan_order(&mut tx, id).await?;

        tx.commit().await?;

        Ok(row.into())
    }

    pub async fn delete_order(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let plan_id: Uuid = sqlx::query_scalar(
            "DELETE FROM month_planing_orders WHERE id = $1 RETURNING month_planing_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Month plan order".to_string()))?;

        rollup::recompute_planing_quantity(&mut tx, plan_id).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_plan(&self, id: Uuid) -> AppResult<MonthPlaningDetail> {
        let mut conn = self.db.acquire().await?;
        let plan = find_plan(&mut conn, id, false).await?;

        let orders = sqlx::query_as::<_, MonthPlaningOrder>(
            "SELECT * FROM month_planing_orders WHERE month_planing_id = $1 ORDER BY order_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(MonthPlaningDetail {
            plan: plan.into(),
            orders: orders.into_iter().map(MonthPlaningOrderView::from).collect(),
        })
    }

    pub async fn list_plans(&self, warehouse_id: Option<Uuid>) -> AppResult<Vec<MonthPlaningView>> {
        let plans = sqlx::query_as::<_, MonthPlaning>(
            r#"
            SELECT * FROM month_planings
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
            ORDER BY year DESC, month DESC
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(plans.into_iter().map(MonthPlaningView::from).collect())
    }

    /// Recompute the plan fact and every order row of one plan
    pub async fn refresh_plan(&self, id: Uuid) -> AppResult<MonthPlaningDetail> {
        let mut tx = self.db.begin().await?;
        let plan = find_plan(&mut tx, id, true).await?;

        rollup::recompute_planing_quantity(&mut tx, id).await?;
        rollup::recompute_month_planing_fact(&mut tx, &plan.period_key()).await?;
        rollup::refresh_plan_orders(&mut tx, id).await?;

        tx.commit().await?;
        self.get_plan(id).await
    }

    /// Stock quantity of every plan row of one order
    pub async fn refresh_stock_quantity(&self, order_id: Uuid) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;
        let refreshed = rollup::refresh_order_stock(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::debug!(%order_id, refreshed, "Plan stock refreshed");
        Ok(refreshed)
    }

    /// Fact and stock of every plan order row; returns the number refreshed
    pub async fn refresh_all_month_planing_orders(&self) -> AppResult<u64> {
        let mut tx = self.db.begin().await?;
        let refreshed = rollup::refresh_all_plan_orders(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(refreshed, "All month plan orders refreshed");
        Ok(refreshed)
    }
}
