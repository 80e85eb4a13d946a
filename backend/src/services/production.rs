//! Production leaf records (line orders)
//!
//! A leaf write runs in one transaction in a fixed order: validate, lock the
//! daily line and the leaf, move stock by the leaf's delta, persist the leaf,
//! then recompute every ancestor.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{AncestorTotals, LeafRecordInput, StockBucket};
use crate::services::ledger;
use crate::services::rollup::{self, PeriodKey};
use shared::{
    plan_stock_moves, AccessoryRatio, LeafChange, OutputTotals, PackagingDelta, StockPlan,
};

/// Production service for leaf records
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
}

/// Output of one line, on one day, against one norm category
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeafRecord {
    pub id: Uuid,
    pub line_id: Uuid,
    pub norm_category_id: Uuid,
    pub sort_1: i32,
    pub sort_2: Option<i32>,
    pub defect_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeafRecord {
    pub fn totals(&self) -> OutputTotals {
        OutputTotals::from_nullable(Some(self.sort_1), self.sort_2, Some(self.defect_quantity))
    }
}

/// Persisted leaf with the totals of every ancestor after the write
#[derive(Debug, Clone, Serialize)]
pub struct LeafWriteResult {
    pub record: LeafRecord,
    pub ancestors: AncestorTotals,
    pub stock: StockPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafDeleteResult {
    pub id: Uuid,
    pub ancestors: AncestorTotals,
    pub stock: StockPlan,
}

/// Everything a leaf write touches above the leaf itself
#[derive(Debug, Clone)]
pub(crate) struct LeafContext {
    pub line_id: Uuid,
    pub daily_id: Uuid,
    pub date: NaiveDate,
    pub production_norm_id: Uuid,
    pub production_line_id: Uuid,
    pub report_id: Uuid,
    pub warehouse_id: Uuid,
    pub year: i32,
    pub month: String,
    pub norm_category_id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
}

impl LeafContext {
    pub fn bucket(&self) -> StockBucket {
        StockBucket {
            order_id: self.order_id,
            variant_id: self.variant_id,
            warehouse_id: self.warehouse_id,
        }
    }

    pub fn period(&self) -> PeriodKey {
        PeriodKey {
            warehouse_id: self.warehouse_id,
            year: self.year,
            month: self.month.clone(),
        }
    }
}

#[derive(Debug, FromRow)]
struct LineScopeRow {
    line_id: Uuid,
    daily_id: Uuid,
    date: NaiveDate,
    production_norm_id: Uuid,
    report_id: Uuid,
    warehouse_id: Uuid,
    year: i32,
    month: String,
}

#[derive(Debug, FromRow)]
struct NormCategoryScopeRow {
    production_norm_id: Uuid,
    production_line_id: Uuid,
    order_id: Uuid,
    order_variant_id: Uuid,
}

const LINE_SCOPE: &str = r#"
    SELECT l.id AS line_id, l.daily_id, d.date, l.production_norm_id,
           d.production_report_id AS report_id, r.warehouse_id, r.year, r.month
    FROM lines l
    JOIN dailies d ON d.id = l.daily_id
    JOIN production_reports r ON r.id = d.production_report_id
    WHERE l.id = $1
"#;

/// Lock a report row. Every write below a report takes this lock before
/// any line, leaf, norm or plan row, so all writers share one lock order.
pub(crate) async fn lock_report(conn: &mut PgConnection, report_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM production_reports WHERE id = $1 FOR UPDATE")
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Production report".to_string()))?;
    Ok(())
}

/// Resolve the daily line and norm category of a leaf.
///
/// With `lock` the owning report row and then the line row are taken
/// `FOR UPDATE`, which serializes every write to leaves of that line,
/// including two concurrent first inserts.
pub(crate) async fn load_leaf_context(
    conn: &mut PgConnection,
    line_id: Uuid,
    norm_category_id: Uuid,
    lock: bool,
) -> AppResult<LeafContext> {
    let mut line = sqlx::query_as::<_, LineScopeRow>(LINE_SCOPE)
        .bind(line_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Line".to_string()))?;

    if lock {
        lock_report(conn, line.report_id).await?;
        // Re-read under lock; the line may have gone with its norm
        line = sqlx::query_as::<_, LineScopeRow>(&format!("{} FOR UPDATE OF l", LINE_SCOPE))
            .bind(line_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Line".to_string()))?;
    }

    let category = sqlx::query_as::<_, NormCategoryScopeRow>(
        r#"
        SELECT nc.production_norm_id, pn.production_line_id, nc.order_id, nc.order_variant_id
        FROM norm_categories nc
        JOIN production_norms pn ON pn.id = nc.production_norm_id
        WHERE nc.id = $1
        "#,
    )
    .bind(norm_category_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Norm category".to_string()))?;

    if category.production_norm_id != line.production_norm_id {
        return Err(AppError::validation(
            "norm_category_id",
            "Norm category is not assigned to this line's production norm",
            "Norma kategoriyasi ushbu liniyaning normasiga tegishli emas",
        ));
    }

    Ok(LeafContext {
        line_id: line.line_id,
        daily_id: line.daily_id,
        date: line.date,
        production_norm_id: line.production_norm_id,
        production_line_id: category.production_line_id,
        report_id: line.report_id,
        warehouse_id: line.warehouse_id,
        year: line.year,
        month: line.month,
        norm_category_id,
        order_id: category.order_id,
        variant_id: category.order_variant_id,
    })
}

/// Stock plan of a leaf change, with accessory ratios loaded only when
/// garments actually move
async fn plan_for_change(
    conn: &mut PgConnection,
    order_id: Uuid,
    change: &LeafChange,
) -> AppResult<StockPlan> {
    let ratios = if change.consumption_delta() != 0 {
        ledger::load_accessory_ratios(conn, order_id).await?
    } else {
        Vec::new()
    };
    Ok(plan_stock_moves(change, &ratios))
}

// ============================================================================
// Cascaded reversal
// ============================================================================

/// Parent whose leaves are about to disappear through a cascade
#[derive(Debug, Clone, Copy)]
pub(crate) enum LeafScope {
    NormCategory(Uuid),
    ProductionNorm(Uuid),
    Report(Uuid),
}

impl LeafScope {
    fn filter(&self) -> &'static str {
        match self {
            LeafScope::NormCategory(_) => "lo.norm_category_id = $1",
            LeafScope::ProductionNorm(_) => "nc.production_norm_id = $1",
            LeafScope::Report(_) => "d.production_report_id = $1",
        }
    }

    fn id(&self) -> Uuid {
        match self {
            LeafScope::NormCategory(id) | LeafScope::ProductionNorm(id) | LeafScope::Report(id) => {
                *id
            }
        }
    }
}

/// What a reversal touched, for the follow-up recompute
#[derive(Debug, Default)]
pub(crate) struct ReversedLeaves {
    pub count: usize,
    pub line_ids: BTreeSet<Uuid>,
    pub daily_ids: BTreeSet<Uuid>,
    pub order_ids: BTreeSet<Uuid>,
}

#[derive(Debug, FromRow)]
struct ReversalRow {
    id: Uuid,
    line_id: Uuid,
    daily_id: Uuid,
    sort_1: i32,
    sort_2: Option<i32>,
    defect_quantity: i32,
    order_id: Uuid,
    order_variant_id: Uuid,
    warehouse_id: Uuid,
}

const SCOPED_LEAVES: &str = r#"
    FROM line_orders lo
    JOIN lines l ON l.id = lo.line_id
    JOIN dailies d ON d.id = l.daily_id
    JOIN production_reports r ON r.id = d.production_report_id
    JOIN norm_categories nc ON nc.id = lo.norm_category_id
"#;

/// Give back the stock of every leaf under `scope`, as an explicit delete
/// of each would. The caller must already hold the report lock
/// ([`lock_report`]) and deletes the parent afterwards.
pub(crate) async fn reverse_leaves(
    conn: &mut PgConnection,
    scope: LeafScope,
) -> AppResult<ReversedLeaves> {
    // Lines next, in id order, then leaves: the order single leaf writes use
    let lock_lines = format!(
        "SELECT l.id {} WHERE {} ORDER BY l.id FOR UPDATE OF l",
        SCOPED_LEAVES,
        scope.filter()
    );
    sqlx::query_scalar::<_, Uuid>(&lock_lines)
        .bind(scope.id())
        .fetch_all(&mut *conn)
        .await?;

    let select_leaves = format!(
        r#"
        SELECT lo.id, lo.line_id, l.daily_id, lo.sort_1, lo.sort_2, lo.defect_quantity,
               nc.order_id, nc.order_variant_id, r.warehouse_id
        {}
        WHERE {}
        ORDER BY lo.id
        FOR UPDATE OF lo
        "#,
        SCOPED_LEAVES,
        scope.filter()
    );
    let rows = sqlx::query_as::<_, ReversalRow>(&select_leaves)
        .bind(scope.id())
        .fetch_all(&mut *conn)
        .await?;

    let mut ratios: HashMap<Uuid, Vec<AccessoryRatio>> = HashMap::new();
    let mut garments: BTreeMap<(Uuid, Uuid, Uuid), (i32, PackagingDelta)> = BTreeMap::new();
    let mut accessories: BTreeMap<(Uuid, Uuid), Decimal> = BTreeMap::new();
    let mut reversed = ReversedLeaves::default();

    for row in rows {
        let totals =
            OutputTotals::from_nullable(Some(row.sort_1), row.sort_2, Some(row.defect_quantity));
        if !ratios.contains_key(&row.order_id) {
            let loaded = ledger::load_accessory_ratios(conn, row.order_id).await?;
            ratios.insert(row.order_id, loaded);
        }
        let article = ratios.get(&row.order_id).map(Vec::as_slice).unwrap_or(&[]);
        let plan = plan_stock_moves(&LeafChange::delete(totals), article);

        let entry = garments
            .entry((row.order_id, row.order_variant_id, row.warehouse_id))
            .or_default();
        entry.0 += plan.variant_delta;
        entry.1.sort_1 += plan.packaging.sort_1;
        entry.1.sort_2 += plan.packaging.sort_2;
        for accessory in &plan.accessory_moves {
            *accessories
                .entry((accessory.accessory_id, row.warehouse_id))
                .or_default() += accessory.delta;
        }

        tracing::debug!(leaf_id = %row.id, released = plan.variant_delta, "Leaf stock reversed");

        reversed.count += 1;
        reversed.line_ids.insert(row.line_id);
        reversed.daily_ids.insert(row.daily_id);
        reversed.order_ids.insert(row.order_id);
    }

    // Buckets in key order, variants before accessories, as a leaf write does
    for (&(order_id, variant_id, warehouse_id), &(delta, _)) in &garments {
        let bucket = StockBucket {
            order_id,
            variant_id,
            warehouse_id,
        };
        ledger::apply_variant_delta(conn, &bucket, delta).await?;
    }
    for (&(accessory_id, warehouse_id), &delta) in &accessories {
        ledger::apply_accessory_delta(conn, accessory_id, warehouse_id, delta).await?;
    }
    for (&(order_id, variant_id, warehouse_id), &(_, packaging)) in &garments {
        let bucket = StockBucket {
            order_id,
            variant_id,
            warehouse_id,
        };
        ledger::adjust_packaging(conn, &bucket, packaging).await?;
    }

    Ok(reversed)
}

impl ProductionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create or update the leaf for (line, norm category)
    pub async fn upsert_leaf_record(&self, input: LeafRecordInput) -> AppResult<LeafWriteResult> {
        input.validate()?;
        let new_totals = input.totals();
        shared::validate_output(&new_totals).map_err(|msg| {
            AppError::validation("sort_1", msg, "Ishlab chiqarilgan miqdor noto'g'ri")
        })?;

        let mut tx = self.db.begin().await?;

        let ctx = load_leaf_context(&mut tx, input.line_id, input.norm_category_id, true).await?;

        let existing = sqlx::query_as::<_, LeafRecord>(
            r#"
            SELECT * FROM line_orders
            WHERE line_id = $1 AND norm_category_id = $2
            FOR UPDATE
            "#,
        )
        .bind(input.line_id)
        .bind(input.norm_category_id)
        .fetch_optional(&mut *tx)
        .await?;

        let change = match &existing {
            Some(record) => LeafChange::update(record.totals(), new_totals),
            None => LeafChange::create(new_totals),
        };

        let plan = plan_for_change(&mut tx, ctx.order_id, &change).await?;
        ledger::apply_stock_plan(&mut tx, &ctx.bucket(), &plan).await?;

        let record = sqlx::query_as::<_, LeafRecord>(
            r#"
            INSERT INTO line_orders (line_id, norm_category_id, sort_1, sort_2, defect_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (line_id, norm_category_id)
            DO UPDATE SET sort_1 = EXCLUDED.sort_1,
                          sort_2 = EXCLUDED.sort_2,
                          defect_quantity = EXCLUDED.defect_quantity,
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.line_id)
        .bind(input.norm_category_id)
        .bind(input.sort_1)
        .bind(input.sort_2)
        .bind(input.defect_quantity.unwrap_or(0))
        .fetch_one(&mut *tx)
        .await?;

        let ancestors = rollup::recompute_after_leaf_write(&mut tx, &ctx).await?;

        tx.commit().await?;

        tracing::debug!(
            leaf_id = %record.id,
            created = existing.is_none(),
            consumed = change.consumption_delta(),
            "Leaf record written"
        );

        Ok(LeafWriteResult {
            record,
            ancestors,
            stock: plan,
        })
    }

    /// Delete a leaf, giving back everything it consumed
    pub async fn delete_leaf_record(&self, id: Uuid) -> AppResult<LeafDeleteResult> {
        let mut tx = self.db.begin().await?;

        let (line_id, norm_category_id) = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT line_id, norm_category_id FROM line_orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Line order".to_string()))?;

        let ctx = load_leaf_context(&mut tx, line_id, norm_category_id, true).await?;

        // Re-read under lock; a concurrent delete may have won
        let record = sqlx::query_as::<_, LeafRecord>(
            "SELECT * FROM line_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Line order".to_string()))?;

        let change = LeafChange::delete(record.totals());
        let plan = plan_for_change(&mut tx, ctx.order_id, &change).await?;
        ledger::apply_stock_plan(&mut tx, &ctx.bucket(), &plan).await?;

        sqlx::query("DELETE FROM line_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let ancestors = rollup::recompute_after_leaf_write(&mut tx, &ctx).await?;

        tx.commit().await?;

        tracing::debug!(leaf_id = %id, released = plan.variant_delta, "Leaf record deleted");

        Ok(LeafDeleteResult {
            id,
            ancestors,
            stock: plan,
        })
    }

    pub async fn get_leaf_record(&self, id: Uuid) -> AppResult<LeafRecord> {
        sqlx::query_as::<_, LeafRecord>("SELECT * FROM line_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Line order".to_string()))
    }

    /// Leaves recorded on one daily line
    pub async fn list_for_line(&self, line_id: Uuid) -> AppResult<Vec<LeafRecord>> {
        let records = sqlx::query_as::<_, LeafRecord>(
            "SELECT * FROM line_orders WHERE line_id = $1 ORDER BY created_at",
        )
        .bind(line_id)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }
}
