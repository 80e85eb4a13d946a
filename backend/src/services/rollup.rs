//! Rollup chain recomputation
//!
//! Every level is a full `COALESCE(SUM(..), 0)` re-aggregation of its current
//! children written in one statement, so recomputing twice with no writes in
//! between yields the same totals. The norm-category chain feeds the report
//! totals; the line/daily chain feeds the calendar and the month-plan fact.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::AncestorTotals;
use crate::services::production::LeafContext;
use shared::{OutputTotals, RollupLevel, RECOMPUTE_ORDER};

/// Warehouse period shared by a report and its month plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PeriodKey {
    pub warehouse_id: Uuid,
    pub year: i32,
    pub month: String,
}

#[derive(Debug, FromRow)]
struct TotalsRow {
    sort_1: i32,
    sort_2: i32,
    defect: i32,
}

impl From<TotalsRow> for OutputTotals {
    fn from(row: TotalsRow) -> Self {
        OutputTotals::new(row.sort_1, row.sort_2, row.defect)
    }
}

#[derive(Debug, FromRow)]
struct ReportTotalsRow {
    sort_1: i32,
    sort_2: i32,
    defect: i32,
    total_norm: i32,
}

/// Fact and stock written to one month-plan order
#[derive(Debug, Clone, Copy, Serialize, FromRow)]
pub struct PlanOrderFacts {
    pub fact_quantity: i32,
    pub stock_quantity: i32,
}

// ============================================================================
// Norm-category chain
// ============================================================================

pub(crate) async fn recompute_norm_category(
    conn: &mut PgConnection,
    norm_category_id: Uuid,
) -> AppResult<OutputTotals> {
    let row = sqlx::query_as::<_, TotalsRow>(
        r#"
        UPDATE norm_categories nc
        SET total_sort_1 = agg.s1, total_sort_2 = agg.s2, total_defect = agg.d
        FROM (
            SELECT COALESCE(SUM(sort_1), 0)::INT AS s1,
                   COALESCE(SUM(COALESCE(sort_2, 0)), 0)::INT AS s2,
                   COALESCE(SUM(defect_quantity), 0)::INT AS d
            FROM line_orders
            WHERE norm_category_id = $1
        ) agg
        WHERE nc.id = $1
        RETURNING nc.total_sort_1 AS sort_1, nc.total_sort_2 AS sort_2, nc.total_defect AS defect
        "#,
    )
    .bind(norm_category_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into).unwrap_or_default())
}

/// Same-day snapshot of a norm category on a production line
pub(crate) async fn upsert_line_daily_output(
    conn: &mut PgConnection,
    production_line_id: Uuid,
    norm_category_id: Uuid,
    date: NaiveDate,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO line_daily_outputs
            (production_line_id, norm_category_id, date, sort_1, sort_2, defect_quantity)
        SELECT $1, $2, $3,
               COALESCE(SUM(lo.sort_1), 0)::INT,
               COALESCE(SUM(COALESCE(lo.sort_2, 0)), 0)::INT,
               COALESCE(SUM(lo.defect_quantity), 0)::INT
        FROM line_orders lo
        JOIN lines l ON l.id = lo.line_id
        JOIN dailies d ON d.id = l.daily_id
        WHERE lo.norm_category_id = $2 AND d.date = $3
        ON CONFLICT (production_line_id, norm_category_id, date)
        DO UPDATE SET sort_1 = EXCLUDED.sort_1,
                      sort_2 = EXCLUDED.sort_2,
                      defect_quantity = EXCLUDED.defect_quantity
        "#,
    )
    .bind(production_line_id)
    .bind(norm_category_id)
    .bind(date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn recompute_production_norm(
    conn: &mut PgConnection,
    production_norm_id: Uuid,
) -> AppResult<OutputTotals> {
    let row = sqlx::query_as::<_, TotalsRow>(
        r#"
        UPDATE production_norms pn
        SET total_sort_1 = agg.s1, total_sort_2 = agg.s2, total_defect = agg.d
        FROM (
            SELECT COALESCE(SUM(total_sort_1), 0)::INT AS s1,
                   COALESCE(SUM(total_sort_2), 0)::INT AS s2,
                   COALESCE(SUM(total_defect), 0)::INT AS d
            FROM norm_categories
            WHERE production_norm_id = $1
        ) agg
        WHERE pn.id = $1
        RETURNING pn.total_sort_1 AS sort_1, pn.total_sort_2 AS sort_2, pn.total_defect AS defect
        "#,
    )
    .bind(production_norm_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into).unwrap_or_default())
}

/// Report totals from its production norms, plus the sum of every norm target
pub(crate) async fn recompute_report(
    conn: &mut PgConnection,
    report_id: Uuid,
) -> AppResult<(OutputTotals, i32)> {
    let row = sqlx::query_as::<_, ReportTotalsRow>(
        r#"
        UPDATE production_reports r
        SET total_sort_1 = agg.s1, total_sort_2 = agg.s2, total_defect = agg.d,
            total_norm = norms.total_norm
        FROM (
            SELECT COALESCE(SUM(total_sort_1), 0)::INT AS s1,
                   COALESCE(SUM(total_sort_2), 0)::INT AS s2,
                   COALESCE(SUM(total_defect), 0)::INT AS d
            FROM production_norms
            WHERE production_report_id = $1
        ) agg,
        (
            SELECT COALESCE(SUM(nc.norm), 0)::INT AS total_norm
            FROM norm_categories nc
            JOIN production_norms pn ON pn.id = nc.production_norm_id
            WHERE pn.production_report_id = $1
        ) norms
        WHERE r.id = $1
        RETURNING r.total_sort_1 AS sort_1, r.total_sort_2 AS sort_2,
                  r.total_defect AS defect, r.total_norm
        "#,
    )
    .bind(report_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row
        .map(|r| (OutputTotals::new(r.sort_1, r.sort_2, r.defect), r.total_norm))
        .unwrap_or_default())
}

// ============================================================================
// Line / daily chain
// ============================================================================

pub(crate) async fn recompute_line(
    conn: &mut PgConnection,
    line_id: Uuid,
) -> AppResult<OutputTotals> {
    let row = sqlx::query_as::<_, TotalsRow>(
        r#"
        UPDATE lines l
        SET sort_1 = agg.s1, sort_2 = agg.s2, defect_quantity = agg.d
        FROM (
            SELECT COALESCE(SUM(sort_1), 0)::INT AS s1,
                   COALESCE(SUM(COALESCE(sort_2, 0)), 0)::INT AS s2,
                   COALESCE(SUM(defect_quantity), 0)::INT AS d
            FROM line_orders
            WHERE line_id = $1
        ) agg
        WHERE l.id = $1
        RETURNING l.sort_1, l.sort_2, l.defect_quantity AS defect
        "#,
    )
    .bind(line_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into).unwrap_or_default())
}

pub(crate) async fn recompute_daily(
    conn: &mut PgConnection,
    daily_id: Uuid,
) -> AppResult<OutputTotals> {
    let row = sqlx::query_as::<_, TotalsRow>(
        r#"
        UPDATE dailies d
        SET sort_1 = agg.s1, sort_2 = agg.s2, defect_quantity = agg.d
        FROM (
            SELECT COALESCE(SUM(sort_1), 0)::INT AS s1,
                   COALESCE(SUM(sort_2), 0)::INT AS s2,
                   COALESCE(SUM(defect_quantity), 0)::INT AS d
            FROM lines
            WHERE daily_id = $1
        ) agg
        WHERE d.id = $1
        RETURNING d.sort_1, d.sort_2, d.defect_quantity AS defect
        "#,
    )
    .bind(daily_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into).unwrap_or_default())
}

// ============================================================================
// Set-based variants for cascaded changes
// ============================================================================

pub(crate) async fn recompute_norm_categories(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE norm_categories nc
        SET total_sort_1 = agg.s1, total_sort_2 = agg.s2, total_defect = agg.d
        FROM (
            SELECT n.id,
                   COALESCE(SUM(lo.sort_1), 0)::INT AS s1,
                   COALESCE(SUM(COALESCE(lo.sort_2, 0)), 0)::INT AS s2,
                   COALESCE(SUM(lo.defect_quantity), 0)::INT AS d
            FROM norm_categories n
            LEFT JOIN line_orders lo ON lo.norm_category_id = n.id
            WHERE n.id = ANY($1)
            GROUP BY n.id
        ) agg
        WHERE nc.id = agg.id
        "#,
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Re-derive every line-daily snapshot of the given norm categories
pub(crate) async fn refresh_line_daily_outputs(
    conn: &mut PgConnection,
    norm_category_ids: &[Uuid],
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE line_daily_outputs
        SET sort_1 = 0, sort_2 = 0, defect_quantity = 0
        WHERE norm_category_id = ANY($1)
        "#,
    )
    .bind(norm_category_ids)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO line_daily_outputs
            (production_line_id, norm_category_id, date, sort_1, sort_2, defect_quantity)
        SELECT pn.production_line_id, lo.norm_category_id, d.date,
               COALESCE(SUM(lo.sort_1), 0)::INT,
               COALESCE(SUM(COALESCE(lo.sort_2, 0)), 0)::INT,
               COALESCE(SUM(lo.defect_quantity), 0)::INT
        FROM line_orders lo
        JOIN lines l ON l.id = lo.line_id
        JOIN dailies d ON d.id = l.daily_id
        JOIN production_norms pn ON pn.id = l.production_norm_id
        WHERE lo.norm_category_id = ANY($1)
        GROUP BY pn.production_line_id, lo.norm_category_id, d.date
        ON CONFLICT (production_line_id, norm_category_id, date)
        DO UPDATE SET sort_1 = EXCLUDED.sort_1,
                      sort_2 = EXCLUDED.sort_2,
                      defect_quantity = EXCLUDED.defect_quantity
        "#,
    )
    .bind(norm_category_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn recompute_production_norms(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE production_norms pn
        SET total_sort_1 = agg.s1, total_sort_2 = agg.s2, total_defect = agg.d
        FROM (
            SELECT p.id,
                   COALESCE(SUM(nc.total_sort_1), 0)::INT AS s1,
                   COALESCE(SUM(nc.total_sort_2), 0)::INT AS s2,
                   COALESCE(SUM(nc.total_defect), 0)::INT AS d
            FROM production_norms p
            LEFT JOIN norm_categories nc ON nc.production_norm_id = p.id
            WHERE p.id = ANY($1)
            GROUP BY p.id
        ) agg
        WHERE pn.id = agg.id
        "#,
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn recompute_lines(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE lines t
        SET sort_1 = agg.s1, sort_2 = agg.s2, defect_quantity = agg.d
        FROM (
            SELECT l.id,
                   COALESCE(SUM(lo.sort_1), 0)::INT AS s1,
                   COALESCE(SUM(COALESCE(lo.sort_2, 0)), 0)::INT AS s2,
                   COALESCE(SUM(lo.defect_quantity), 0)::INT AS d
            FROM lines l
            LEFT JOIN line_orders lo ON lo.line_id = l.id
            WHERE l.id = ANY($1)
            GROUP BY l.id
        ) agg
        WHERE t.id = agg.id
        "#,
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn recompute_dailies(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE dailies t
        SET sort_1 = agg.s1, sort_2 = agg.s2, defect_quantity = agg.d
        FROM (
            SELECT d.id,
                   COALESCE(SUM(l.sort_1), 0)::INT AS s1,
                   COALESCE(SUM(l.sort_2), 0)::INT AS s2,
                   COALESCE(SUM(l.defect_quantity), 0)::INT AS d
            FROM dailies d
            LEFT JOIN lines l ON l.daily_id = d.id
            WHERE d.id = ANY($1)
            GROUP BY d.id
        ) agg
        WHERE t.id = agg.id
        "#,
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

// ============================================================================
// Month planning
// ============================================================================

/// Plan fact from the line chain; `None` when the period has no plan
pub(crate) async fn recompute_month_planing_fact(
    conn: &mut PgConnection,
    period: &PeriodKey,
) -> AppResult<Option<i32>> {
    let fact: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE month_planings mp
        SET fact_quantity = agg.fact
        FROM (
            SELECT COALESCE(SUM(l.sort_1 + l.sort_2), 0)::INT AS fact
            FROM lines l
            JOIN dailies d ON d.id = l.daily_id
            JOIN production_reports r ON r.id = d.production_report_id
            WHERE r.warehouse_id = $1 AND r.year = $2 AND r.month = $3
        ) agg
        WHERE mp.warehouse_id = $1 AND mp.year = $2 AND mp.month = $3
        RETURNING mp.fact_quantity
        "#,
    )
    .bind(period.warehouse_id)
    .bind(period.year)
    .bind(&period.month)
    .fetch_optional(&mut *conn)
    .await?;

    if fact.is_none() {
        tracing::debug!(year = period.year, month = %period.month, "No month plan for period, skipped");
    }
    Ok(fact)
}

/// Per-order fact (norm-category chain) and stock for every plan order row.
/// Callers append the filter.
const PLAN_ORDER_REFRESH: &str = r#"
    UPDATE month_planing_orders mpo
    SET fact_quantity = COALESCE((
            SELECT SUM(nc.total_sort_1 + nc.total_sort_2)
            FROM norm_categories nc
            JOIN production_norms pn ON pn.id = nc.production_norm_id
            JOIN production_reports r ON r.id = pn.production_report_id
            WHERE nc.order_id = mpo.order_id
              AND r.warehouse_id = mp.warehouse_id
              AND r.year = mp.year
              AND r.month = mp.month
        ), 0)::INT,
        stock_quantity = COALESCE((
            SELECT SUM(vs.quantity)
            FROM variant_stocks vs
            WHERE vs.order_id = mpo.order_id AND vs.warehouse_id = mp.warehouse_id
        ), 0)::INT
    FROM month_planings mp
    WHERE mp.id = mpo.month_planing_id
"#;

/// Fact and stock of one order's row in the period's plan, if any
pub(crate) async fn recompute_month_planing_order(
    conn: &mut PgConnection,
    period: &PeriodKey,
    order_id: Uuid,
) -> AppResult<Option<PlanOrderFacts>> {
    let sql = format!(
        "{} AND mp.warehouse_id = $1 AND mp.year = $2 AND mp.month = $3 AND mpo.order_id = $4 \
         RETURNING mpo.fact_quantity, mpo.stock_quantity",
        PLAN_ORDER_REFRESH
    );
    let facts = sqlx::query_as::<_, PlanOrderFacts>(&sql)
        .bind(period.warehouse_id)
        .bind(period.year)
        .bind(&period.month)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(facts)
}

pub(crate) async fn refresh_plan_orders(
    conn: &mut PgConnection,
    month_planing_id: Uuid,
) -> AppResult<u64> {
    let sql = format!("{} AND mp.id = $1", PLAN_ORDER_REFRESH);
    let result = sqlx::query(&sql)
        .bind(month_planing_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn refresh_all_plan_orders(conn: &mut PgConnection) -> AppResult<u64> {
    let result = sqlx::query(PLAN_ORDER_REFRESH).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Stock quantity of every plan row of an order, from its plan's warehouse
pub(crate) async fn refresh_order_stock(conn: &mut PgConnection, order_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE month_planing_orders mpo
        SET stock_quantity = COALESCE((
                SELECT SUM(vs.quantity)
                FROM variant_stocks vs
                WHERE vs.order_id = mpo.order_id AND vs.warehouse_id = mp.warehouse_id
            ), 0)::INT
        FROM month_planings mp
        WHERE mp.id = mpo.month_planing_id AND mpo.order_id = $1
        "#,
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn recompute_planing_quantity(
    conn: &mut PgConnection,
    month_planing_id: Uuid,
) -> AppResult<i32> {
    let quantity: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE month_planings mp
        SET planing_quantity = agg.total
        FROM (
            SELECT COALESCE(SUM(planed_quantity), 0)::INT AS total
            FROM month_planing_orders
            WHERE month_planing_id = $1
        ) agg
        WHERE mp.id = $1
        RETURNING mp.planing_quantity
        "#,
    )
    .bind(month_planing_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Month-plan fact and every order row of the period's plan
pub(crate) async fn refresh_period_plan(
    conn: &mut PgConnection,
    period: &PeriodKey,
) -> AppResult<()> {
    let plan_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM month_planings WHERE warehouse_id = $1 AND year = $2 AND month = $3",
    )
    .bind(period.warehouse_id)
    .bind(period.year)
    .bind(&period.month)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(plan_id) = plan_id {
        recompute_month_planing_fact(conn, period).await?;
        refresh_plan_orders(conn, plan_id).await?;
    }
    Ok(())
}

// ============================================================================
// Orchestration
// ============================================================================

/// Recompute every ancestor of a written leaf, in [`RECOMPUTE_ORDER`]
pub(crate) async fn recompute_after_leaf_write(
    conn: &mut PgConnection,
    ctx: &LeafContext,
) -> AppResult<AncestorTotals> {
    let period = ctx.period();
    let mut totals = AncestorTotals::default();

    for level in RECOMPUTE_ORDER {
        match level {
            RollupLevel::NormCategory => {
                totals.norm_category = recompute_norm_category(conn, ctx.norm_category_id).await?;
            }
            RollupLevel::LineDailyOutput => {
                upsert_line_daily_output(
                    conn,
                    ctx.production_line_id,
                    ctx.norm_category_id,
                    ctx.date,
                )
                .await?;
            }
            RollupLevel::ProductionNorm => {
                totals.production_norm =
                    recompute_production_norm(conn, ctx.production_norm_id).await?;
            }
            RollupLevel::ProductionReport => {
                let (report, total_norm) = recompute_report(conn, ctx.report_id).await?;
                totals.report = report;
                totals.report_total_norm = total_norm;
            }
            RollupLevel::Line => {
                totals.line = recompute_line(conn, ctx.line_id).await?;
            }
            RollupLevel::Daily => {
                totals.daily = recompute_daily(conn, ctx.daily_id).await?;
            }
            RollupLevel::MonthPlaning => {
                totals.month_planing_fact = recompute_month_planing_fact(conn, &period).await?;
            }
            RollupLevel::MonthPlaningOrder => {
                totals.month_planing_order_fact =
                    recompute_month_planing_order(conn, &period, ctx.order_id)
                        .await?
                        .map(|facts| facts.fact_quantity);
            }
        }
        tracing::debug!(level = level.as_str(), "Rollup level recomputed");
    }

    Ok(totals)
}

/// Rebuild every aggregate of a report from its leaf records
pub(crate) async fn recompute_report_tree(
    conn: &mut PgConnection,
    report_id: Uuid,
    period: &PeriodKey,
) -> AppResult<()> {
    let norm_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM production_norms WHERE production_report_id = $1")
            .bind(report_id)
            .fetch_all(&mut *conn)
            .await?;

    let category_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM norm_categories WHERE production_norm_id = ANY($1)")
            .bind(&norm_ids)
            .fetch_all(&mut *conn)
            .await?;

    let daily_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM dailies WHERE production_report_id = $1")
            .bind(report_id)
            .fetch_all(&mut *conn)
            .await?;

    let line_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM lines WHERE daily_id = ANY($1)")
        .bind(&daily_ids)
        .fetch_all(&mut *conn)
        .await?;

    recompute_norm_categories(conn, &category_ids).await?;
    refresh_line_daily_outputs(conn, &category_ids).await?;
    recompute_production_norms(conn, &norm_ids).await?;
    recompute_report(conn, report_id).await?;
    recompute_lines(conn, &line_ids).await?;
    recompute_dailies(conn, &daily_ids).await?;
    refresh_period_plan(conn, period).await?;

    tracing::debug!(
        %report_id,
        norm_categories = category_ids.len(),
        lines = line_ids.len(),
        "Report tree recomputed"
    );
    Ok(())
}
