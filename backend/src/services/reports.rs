//! Production reports: calendar creation, line assignment and summaries

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{AssignLinesInput, CreateReportInput};
use crate::services::production::{self, LeafScope};
use crate::services::rollup::{self, PeriodKey};
use shared::{
    day_norm, is_weekend, percent_done, summarize_categories, CategoryFact, OutputTotals,
    ReportPeriod,
};

/// Report service for production reports and their calendars
#[derive(Clone)]
pub struct ReportService {
    db: PgPool,
}

/// Monthly production report of a warehouse
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductionReport {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub year: i32,
    pub month: String,
    pub total_sort_1: i32,
    pub total_sort_2: i32,
    pub total_defect: i32,
    pub total_norm: i32,
    pub working_days: Option<i32>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProductionReport {
    pub fn period(&self) -> AppResult<ReportPeriod> {
        ReportPeriod::parse(self.year, &self.month).map_err(|msg| {
            AppError::Internal(format!("Report {} has a corrupt period: {}", self.id, msg))
        })
    }

    pub(crate) fn period_key(&self) -> PeriodKey {
        PeriodKey {
            warehouse_id: self.warehouse_id,
            year: self.year,
            month: self.month.clone(),
        }
    }
}

/// Report with the derived dashboard fields
#[derive(Debug, Clone, Serialize)]
pub struct ProductionReportView {
    #[serde(flatten)]
    pub report: ProductionReport,
    pub period: String,
    pub month_name: String,
    pub percent_done: Decimal,
    pub day_norm: i32,
}

impl ProductionReportView {
    fn build(report: ProductionReport) -> AppResult<Self> {
        let period = report.period()?;
        let fact = i64::from(report.total_sort_1) + i64::from(report.total_sort_2);
        Ok(Self {
            period: period.to_string(),
            month_name: period.month_name().to_string(),
            percent_done: percent_done(fact, i64::from(report.total_norm)),
            day_norm: day_norm(report.total_norm, report.working_days),
            report,
        })
    }
}

/// One calendar day of a report
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Daily {
    pub id: Uuid,
    pub production_report_id: Uuid,
    pub date: NaiveDate,
    pub sort_1: i32,
    pub sort_2: i32,
    pub defect_quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyView {
    #[serde(flatten)]
    pub daily: Daily,
    pub is_weekend: bool,
}

impl From<Daily> for DailyView {
    fn from(daily: Daily) -> Self {
        Self {
            is_weekend: is_weekend(daily.date),
            daily,
        }
    }
}

/// A production line assigned to a report
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductionNorm {
    pub id: Uuid,
    pub production_report_id: Uuid,
    pub production_line_id: Uuid,
    pub total_sort_1: i32,
    pub total_sort_2: i32,
    pub total_defect: i32,
}

/// Daily instance of an assigned line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Line {
    pub id: Uuid,
    pub daily_id: Uuid,
    pub production_norm_id: Uuid,
    pub sort_1: i32,
    pub sort_2: i32,
    pub defect_quantity: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategorySummary {
    pub id: Uuid,
    pub production_report_id: Uuid,
    pub category_id: Uuid,
    pub norm: i32,
    pub actual: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    pub report: ProductionReportView,
    pub dailies: Vec<DailyView>,
    pub production_norms: Vec<ProductionNorm>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignedLine {
    pub production_norm: ProductionNorm,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedLine {
    pub production_norm_id: Uuid,
    pub reversed_leaves: usize,
    pub report: ProductionReportView,
}

#[derive(Debug, FromRow)]
struct CategoryFactRow {
    sewing_category_id: Uuid,
    norm: i32,
    total_sort_1: i32,
    total_sort_2: i32,
    total_defect: i32,
}

async fn find_report(
    conn: &mut PgConnection,
    report_id: Uuid,
    lock: bool,
) -> AppResult<ProductionReport> {
    let sql = if lock {
        "SELECT * FROM production_reports WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM production_reports WHERE id = $1"
    };
    sqlx::query_as::<_, ProductionReport>(sql)
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Production report".to_string()))
}

/// One production norm for the line plus one daily line per calendar day
async fn assign_line(
    conn: &mut PgConnection,
    report: &ProductionReport,
    production_line_id: Uuid,
) -> AppResult<AssignedLine> {
    let line_warehouse: Uuid =
        sqlx::query_scalar("SELECT warehouse_id FROM production_lines WHERE id = $1")
            .bind(production_line_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Production line".to_string()))?;

    if line_warehouse != report.warehouse_id {
        return Err(AppError::validation(
            "line_ids",
            "Production line belongs to another warehouse",
            "Ishlab chiqarish liniyasi boshqa omborga tegishli",
        ));
    }

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM production_norms
            WHERE production_report_id = $1 AND production_line_id = $2
        )
        "#,
    )
    .bind(report.id)
    .bind(production_line_id)
    .fetch_one(&mut *conn)
    .await?;

    if exists {
        return Err(AppError::DuplicateEntry("production line".to_string()));
    }

    let production_norm = sqlx::query_as::<_, ProductionNorm>(
        r#"
        INSERT INTO production_norms (production_report_id, production_line_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(report.id)
    .bind(production_line_id)
    .fetch_one(&mut *conn)
    .await?;

    let lines = sqlx::query_as::<_, Line>(
        r#"
        INSERT INTO lines (daily_id, production_norm_id)
        SELECT d.id, $2 FROM dailies d
        WHERE d.production_report_id = $1
        RETURNING *
        "#,
    )
    .bind(report.id)
    .bind(production_norm.id)
    .fetch_all(&mut *conn)
    .await?;

    tracing::debug!(
        report_id = %report.id,
        %production_line_id,
        lines = lines.len(),
        "Line assigned to report"
    );

    Ok(AssignedLine {
        production_norm,
        lines,
    })
}

impl ReportService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a report and one daily row per calendar day, atomically
    pub async fn create_report_with_calendar(
        &self,
        input: CreateReportInput,
    ) -> AppResult<ReportDetail> {
        input.validate()?;
        let period = shared::validate_period(input.year, &input.month)
            .map_err(|msg| AppError::validation("month", msg, "Oy noto'g'ri ko'rsatilgan"))?;

        let mut tx = self.db.begin().await?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM production_reports
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
            return Err(AppError::DuplicateEntry("report period".to_string()));
        }

        let report = sqlx::query_as::<_, ProductionReport>(
            r#"
            INSERT INTO production_reports (warehouse_id, year, month, working_days, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.warehouse_id)
        .bind(period.year)
        .bind(period.month_code())
        .bind(input.working_days)
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await?;

        let mut dailies = sqlx::query_as::<_, Daily>(
            r#"
            INSERT INTO dailies (production_report_id, date)
            SELECT $1, day FROM UNNEST($2::date[]) AS day
            RETURNING *
            "#,
        )
        .bind(report.id)
        .bind(period.dates())
        .fetch_all(&mut *tx)
        .await?;
        dailies.sort_by_key(|d| d.date);

        // A plan opened before its report starts tracking it here
        rollup::refresh_period_plan(&mut tx, &report.period_key()).await?;

        tx.commit().await?;

        tracing::info!(
            report_id = %report.id,
            period = %period,
            days = dailies.len(),
            "Production report created"
        );

        Ok(ReportDetail {
            report: ProductionReportView::build(report)?,
            dailies: dailies.into_iter().map(DailyView::from).collect(),
            production_norms: Vec::new(),
        })
    }

    /// Assign one production line to every day of a report
    pub async fn assign_line_to_report(
        &self,
        report_id: Uuid,
        production_line_id: Uuid,
    ) -> AppResult<AssignedLine> {
        let mut tx = self.db.begin().await?;
        let report = find_report(&mut tx, report_id, true).await?;
        let assigned = assign_line(&mut tx, &report, production_line_id).await?;
        tx.commit().await?;

        tracing::info!(%report_id, %production_line_id, "Production line assigned");
        Ok(assigned)
    }

    /// Assign several lines in one transaction; any failure assigns none
    pub async fn assign_lines_to_report(
        &self,
        report_id: Uuid,
        input: AssignLinesInput,
    ) -> AppResult<Vec<AssignedLine>> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let report = find_report(&mut tx, report_id, true).await?;

        let unique: BTreeSet<Uuid> = input.line_ids.iter().copied().collect();
        let mut assigned = Vec::with_capacity(unique.len());
        for production_line_id in unique {
            assigned.push(assign_line(&mut tx, &report, production_line_id).await?);
        }

        tx.commit().await?;

        tracing::info!(%report_id, lines = assigned.len(), "Production lines assigned");
        Ok(assigned)
    }

    /// Take a line off a report, giving back the stock of its leaves
    pub async fn remove_line_from_report(
        &self,
        report_id: Uuid,
        production_norm_id: Uuid,
    ) -> AppResult<RemovedLine> {
        let mut tx = self.db.begin().await?;
        let report = find_report(&mut tx, report_id, true).await?;

        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM production_norms WHERE id = $1 AND production_report_id = $2)",
        )
        .bind(production_norm_id)
        .bind(report_id)
        .fetch_one(&mut *tx)
        .await?;

        if !belongs {
            return Err(AppError::NotFound("Production norm".to_string()));
        }

        let reversed =
            production::reverse_leaves(&mut tx, LeafScope::ProductionNorm(production_norm_id))
                .await?;

        sqlx::query("DELETE FROM production_norms WHERE id = $1")
            .bind(production_norm_id)
            .execute(&mut *tx)
            .await?;

        rollup::recompute_report_tree(&mut tx, report_id, &report.period_key()).await?;
        for order_id in &reversed.order_ids {
            rollup::refresh_order_stock(&mut tx, *order_id).await?;
        }

        let report = find_report(&mut tx, report_id, false).await?;
        tx.commit().await?;

        tracing::info!(
            %report_id,
            %production_norm_id,
            reversed = reversed.count,
            "Production line removed from report"
        );

        Ok(RemovedLine {
            production_norm_id,
            reversed_leaves: reversed.count,
            report: ProductionReportView::build(report)?,
        })
    }

    /// Delete a report after reversing the stock of every leaf below it
    pub async fn delete_report(&self, report_id: Uuid) -> AppResult<usize> {
        let mut tx = self.db.begin().await?;
        let report = find_report(&mut tx, report_id, true).await?;

        let reversed = production::reverse_leaves(&mut tx, LeafScope::Report(report_id)).await?;

        sqlx::query("DELETE FROM production_reports WHERE id = $1")
            .bind(report_id)
            .execute(&mut *tx)
            .await?;

        rollup::refresh_period_plan(&mut tx, &report.period_key()).await?;
        for order_id in &reversed.order_ids {
            rollup::refresh_order_stock(&mut tx, *order_id).await?;
        }

        tx.commit().await?;

        tracing::info!(%report_id, reversed = reversed.count, "Production report deleted");
        Ok(reversed.count)
    }

    /// Full rebuild of every aggregate of a report from its leaves
    pub async fn recompute_report(&self, report_id: Uuid) -> AppResult<ProductionReportView> {
        let mut tx = self.db.begin().await?;
        let report = find_report(&mut tx, report_id, true).await?;
        rollup::recompute_report_tree(&mut tx, report_id, &report.period_key()).await?;
        let report = find_report(&mut tx, report_id, false).await?;
        tx.commit().await?;

        ProductionReportView::build(report)
    }

    pub async fn get_report(&self, report_id: Uuid) -> AppResult<ReportDetail> {
        let mut conn = self.db.acquire().await?;
        let report = find_report(&mut conn, report_id, false).await?;

        let dailies = sqlx::query_as::<_, Daily>(
            "SELECT * FROM dailies WHERE production_report_id = $1 ORDER BY date",
        )
        .bind(report_id)
        .fetch_all(&mut *conn)
        .await?;

        let production_norms = sqlx::query_as::<_, ProductionNorm>(
            r#"
            SELECT * FROM production_norms
            WHERE production_report_id = $1
            ORDER BY production_line_id
            "#,
        )
        .bind(report_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ReportDetail {
            report: ProductionReportView::build(report)?,
            dailies: dailies.into_iter().map(DailyView::from).collect(),
            production_norms,
        })
    }

    pub async fn list_reports(&self, warehouse_id: Option<Uuid>) -> AppResult<Vec<ProductionReportView>> {
        let reports = sqlx::query_as::<_, ProductionReport>(
            r#"
            SELECT * FROM production_reports
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
            ORDER BY year DESC, month DESC
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        reports.into_iter().map(ProductionReportView::build).collect()
    }

    /// Daily lines of one production norm, in calendar order
    pub async fn list_lines(&self, production_norm_id: Uuid) -> AppResult<Vec<Line>> {
        let lines = sqlx::query_as::<_, Line>(
            r#"
            SELECT l.* FROM lines l
            JOIN dailies d ON d.id = l.daily_id
            WHERE l.production_norm_id = $1
            ORDER BY d.date
            "#,
        )
        .bind(production_norm_id)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }

    /// Wipe and regenerate the sewing-category summary of a report
    pub async fn regenerate_category_summaries(
        &self,
        report_id: Uuid,
    ) -> AppResult<Vec<CategorySummary>> {
        let mut tx = self.db.begin().await?;
        find_report(&mut tx, report_id, true).await?;

        sqlx::query("DELETE FROM production_category_summaries WHERE production_report_id = $1")
            .bind(report_id)
            .execute(&mut *tx)
            .await?;

        let facts: Vec<CategoryFact> = sqlx::query_as::<_, CategoryFactRow>(
            r#"
            SELECT a.sewing_category_id, nc.norm,
                   nc.total_sort_1, nc.total_sort_2, nc.total_defect
            FROM norm_categories nc
            JOIN production_norms pn ON pn.id = nc.production_norm_id
            JOIN orders o ON o.id = nc.order_id
            JOIN articles a ON a.id = o.article_id
            WHERE pn.production_report_id = $1
            "#,
        )
        .bind(report_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| CategoryFact {
            sewing_category_id: row.sewing_category_id,
            norm: row.norm,
            totals: OutputTotals::new(row.total_sort_1, row.total_sort_2, row.total_defect),
        })
        .collect();

        let mut summaries = Vec::new();
        for row in summarize_categories(&facts) {
            let norm = i32::try_from(row.norm)
                .map_err(|_| AppError::Internal("Category norm overflow".to_string()))?;
            let actual = i32::try_from(row.actual)
                .map_err(|_| AppError::Internal("Category actual overflow".to_string()))?;

            let summary = sqlx::query_as::<_, CategorySummary>(
                r#"
                INSERT INTO production_category_summaries
                    (production_report_id, category_id, norm, actual)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(report_id)
            .bind(row.category_id)
            .bind(norm)
            .bind(actual)
            .fetch_one(&mut *tx)
            .await?;
            summaries.push(summary);
        }

        tx.commit().await?;

        tracing::info!(%report_id, categories = summaries.len(), "Category summaries regenerated");
        Ok(summaries)
    }

    pub async fn list_category_summaries(&self, report_id: Uuid) -> AppResult<Vec<CategorySummary>> {
        let summaries = sqlx::query_as::<_, CategorySummary>(
            r#"
            SELECT * FROM production_category_summaries
            WHERE production_report_id = $1
            ORDER BY category_id
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        Ok(summaries)
    }
}
