//! Dashboard figures, KPI recordings and report data
//!
//! Revenue in reports is the contracted project budget; expenses are the
//! recorded `actual_cost`. Monetary columns are read as `float8` since the
//! results feed percentage maths only.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use fibreflow_core::analytics::{
    self, ExecutiveFigures, FinancialAnalysis, Insight, PerformanceStatus, ProjectProgress,
    Recommendation, ReportType, ScorecardEntry,
};
use futures::TryFutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ProjectCounts {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub on_hold: i64,
    pub planning: i64,
    pub avg_progress: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct PeopleCounts {
    pub total_clients: i64,
    pub active_clients: i64,
    pub active_staff: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ContractorRagCounts {
    pub active: i64,
    pub green: i64,
    pub amber: i64,
    pub red: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct SowTotals {
    pub poles: i64,
    pub drops: i64,
    pub fibre_segments: i64,
    pub fibre_length: f64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct StockTotals {
    pub total_value: f64,
    pub low_stock_items: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub projects: ProjectCounts,
    pub projects_by_status: Vec<StatusCount>,
    pub people: PeopleCounts,
    pub contractors: ContractorRagCounts,
    pub sow: SowTotals,
    pub stock: StockTotals,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KpiMetric {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub metric_type: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub unit: Option<String>,
    pub recorded_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewKpiMetric {
    pub project_id: Option<Uuid>,
    pub metric_type: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub unit: Option<String>,
    pub recorded_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct KpiFilter {
    pub metric_type: Option<String>,
    pub project_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KpiTarget {
    pub id: Uuid,
    pub kpi_id: String,
    pub target_value: f64,
    pub unit: Option<String>,
    pub period: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewKpiTarget {
    pub kpi_id: String,
    pub target_value: f64,
    pub unit: Option<String>,
    pub period: Option<String>,
    pub active: bool,
}

/// Optional report filters, echoed back in the report metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub project_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub department: Option<String>,
}

// Report rows

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct FinancialTotals {
    pub total_budget: f64,
    pub total_expenses: f64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct StaffTotals {
    pub total_staff: i64,
    pub avg_productivity: Option<f64>,
    pub avg_quality: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MetricAverage {
    pub metric_type: String,
    pub avg_value: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectRow {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    pub client_name: Option<String>,
    pub status: String,
    pub progress: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub actual_cost: f64,
    #[sqlx(skip)]
    pub performance_status: Option<PerformanceStatus>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlyProjects {
    pub month: String,
    pub projects_started: i64,
    pub projects_completed: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct BudgetUse {
    pub total_budget: f64,
    pub total_spent: f64,
    pub avg_utilization: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientRevenue {
    pub client_id: Uuid,
    pub client_name: String,
    pub project_count: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlyFinance {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub project_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DepartmentMetrics {
    pub department: Option<String>,
    pub staff_count: i64,
    pub avg_productivity: Option<f64>,
    pub avg_quality: Option<f64>,
    pub avg_safety: Option<f64>,
    pub total_hours: Option<f64>,
    pub total_tasks: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlyPerformance {
    pub month: String,
    pub avg_productivity: Option<f64>,
    pub avg_quality: Option<f64>,
    pub active_staff: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TopPerformer {
    pub staff_id: Uuid,
    pub name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub avg_productivity: Option<f64>,
    pub avg_quality: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CurrentKpi {
    pub metric_type: String,
    pub metric_name: String,
    pub current_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonthlyKpi {
    pub month: String,
    pub metric_type: String,
    pub avg_value: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleUtilization {
    pub department: Option<String>,
    pub position: Option<String>,
    pub staff_count: i64,
    pub avg_hours_worked: Option<f64>,
    #[sqlx(skip)]
    pub avg_utilization: f64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct Capacity {
    pub total_staff: i64,
    pub total_capacity_hours: f64,
    pub total_hours_worked: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectAllocation {
    pub project_name: String,
    pub staff_assigned: i64,
    pub project_hours: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientTotals {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub total_projects: i64,
    pub active_projects: i64,
    pub completed_projects: i64,
    pub total_budget: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectHistory {
    pub name: String,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummaryEntry {
    pub client_id: Uuid,
    pub client_name: String,
    pub total_projects: i64,
    pub success_rate: f64,
    pub total_value: f64,
}

// Report bodies

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveOverview {
    pub projects: ProjectCounts,
    pub financial: FinancialTotals,
    pub staff: StaffTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveSummary {
    pub overview: ExecutiveOverview,
    pub kpis: Vec<MetricAverage>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPerformance {
    pub projects: Vec<ProjectRow>,
    pub timeline: Vec<MonthlyProjects>,
    pub budget: BudgetUse,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub revenue: Vec<ClientRevenue>,
    pub monthly: Vec<MonthlyFinance>,
    pub analysis: FinancialAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffReport {
    pub department_metrics: Vec<DepartmentMetrics>,
    pub trends: Vec<MonthlyPerformance>,
    pub top_performers: Vec<TopPerformer>,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KpiReport {
    pub current: Vec<CurrentKpi>,
    pub historical: Vec<MonthlyKpi>,
    pub targets: Vec<KpiTarget>,
    pub scorecard: BTreeMap<String, ScorecardEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationReport {
    pub utilization: Vec<RoleUtilization>,
    pub capacity: Capacity,
    pub project_allocation: Vec<ProjectAllocation>,
    pub recommendations: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReport {
    pub clients: Vec<ClientTotals>,
    pub project_history: Vec<ProjectHistory>,
    pub summary: Vec<ClientSummaryEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportData {
    ExecutiveSummary(ExecutiveSummary),
    ProjectPerformance(ProjectPerformance),
    FinancialAnalysis(FinancialReport),
    StaffPerformance(StaffReport),
    KpiDashboard(KpiReport),
    ResourceUtilization(UtilizationReport),
    ClientSummary(ClientReport),
}

/// Statuses left out of project reports
const REPORT_EXCLUDED: &str = "('ARCHIVED', 'CANCELLED', 'DELETED')";

pub struct AnalyticsRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, DbError> {
        let (projects, projects_by_status, people, contractors, sow, stock) = tokio::try_join!(
            self.project_counts(None, None),
            self.projects_by_status(),
            self.people_counts(),
            self.contractor_rag_counts(),
            self.sow_totals(),
            self.stock_totals(),
        )?;
        Ok(DashboardStats {
            projects,
            projects_by_status,
            people,
            contractors,
            sow,
            stock,
        })
    }

    async fn project_counts(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<ProjectCounts, DbError> {
        let row = sqlx::query_as::<_, ProjectCounts>(&format!(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE UPPER(status) = 'ACTIVE') AS active,
                   COUNT(*) FILTER (WHERE UPPER(status) = 'COMPLETED') AS completed,
                   COUNT(*) FILTER (WHERE UPPER(status) = 'ON_HOLD') AS on_hold,
                   COUNT(*) FILTER (WHERE UPPER(status) = 'PLANNING') AS planning,
                   AVG(progress) AS avg_progress
            FROM projects
            WHERE UPPER(status) NOT IN {REPORT_EXCLUDED}
              AND ($1::date IS NULL OR created_at::date >= $1)
              AND ($2::date IS NULL OR created_at::date <= $2)
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    async fn projects_by_status(&self) -> Result<Vec<StatusCount>, DbError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM projects GROUP BY status ORDER BY count DESC, status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn people_counts(&self) -> Result<PeopleCounts, DbError> {
        let row = sqlx::query_as::<_, PeopleCounts>(
            r#"
            SELECT (SELECT COUNT(*) FROM clients) AS total_clients,
                   (SELECT COUNT(*) FROM clients WHERE LOWER(status) = 'active') AS active_clients,
                   (SELECT COUNT(*) FROM staff WHERE UPPER(status) = 'ACTIVE') AS active_staff
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    async fn contractor_rag_counts(&self) -> Result<ContractorRagCounts, DbError> {
        let row = sqlx::query_as::<_, ContractorRagCounts>(
            r#"
            SELECT COUNT(*) AS active,
                   COUNT(*) FILTER (WHERE rag_overall = 'green') AS green,
                   COUNT(*) FILTER (WHERE rag_overall = 'amber') AS amber,
                   COUNT(*) FILTER (WHERE rag_overall = 'red') AS red
            FROM contractors
            WHERE is_active
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    async fn sow_totals(&self) -> Result<SowTotals, DbError> {
        let row = sqlx::query_as::<_, SowTotals>(
            r#"
            SELECT (SELECT COUNT(*) FROM sow_poles) AS poles,
                   (SELECT COUNT(*) FROM sow_drops) AS drops,
                   (SELECT COUNT(*) FROM sow_fibre) AS fibre_segments,
                   (SELECT COALESCE(SUM(distance), 0) FROM sow_fibre) AS fibre_length
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    async fn stock_totals(&self) -> Result<StockTotals, DbError> {
        let row = sqlx::query_as::<_, StockTotals>(
            r#"
            SELECT COALESCE(SUM(total_value), 0)::float8 AS total_value,
                   COUNT(*) FILTER (WHERE available_quantity <= reorder_point) AS low_stock_items
            FROM stock_positions
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn kpis(
        &self,
        filter: &KpiFilter,
        page: Pagination,
    ) -> Result<Paginated<KpiMetric>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM kpi_metrics
            WHERE ($1::text IS NULL OR metric_type = $1)
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::date IS NULL OR recorded_date >= $3)
              AND ($4::date IS NULL OR recorded_date <= $4)
            ORDER BY recorded_date DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.metric_type.as_deref())
        .bind(filter.project_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn record_kpi(&self, k: &NewKpiMetric) -> Result<KpiMetric, DbError> {
        sqlx::query_as::<_, KpiMetric>(
            r#"
            INSERT INTO kpi_metrics (
                project_id, metric_type, metric_name, metric_value, unit, recorded_date
            )
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, CURRENT_DATE))
            RETURNING *
            "#,
        )
        .bind(k.project_id)
        .bind(&k.metric_type)
        .bind(&k.metric_name)
        .bind(k.metric_value)
        .bind(&k.unit)
        .bind(k.recorded_date)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::InvalidInput("project_id does not exist".into()),
            other => other,
        })
    }

    pub async fn targets(&self, active_only: bool) -> Result<Vec<KpiTarget>, DbError> {
        let rows = sqlx::query_as::<_, KpiTarget>(
            "SELECT * FROM kpi_targets WHERE (NOT $1 OR active) ORDER BY kpi_id",
        )
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert or replace the target for `kpi_id`.
    pub async fn upsert_target(&self, t: &NewKpiTarget) -> Result<KpiTarget, DbError> {
        let row = sqlx::query_as::<_, KpiTarget>(
            r#"
            INSERT INTO kpi_targets (kpi_id, target_value, unit, period, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (kpi_id) DO UPDATE SET
                target_value = EXCLUDED.target_value,
                unit = EXCLUDED.unit,
                period = EXCLUDED.period,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&t.kpi_id)
        .bind(t.target_value)
        .bind(&t.unit)
        .bind(&t.period)
        .bind(t.active)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn report(
        &self,
        report_type: ReportType,
        params: &ReportParams,
    ) -> Result<ReportData, DbError> {
        let data = match report_type {
            ReportType::ExecutiveSummary => {
                ReportData::ExecutiveSummary(self.executive_summary(params).await?)
            }
            ReportType::ProjectPerformance => {
                ReportData::ProjectPerformance(self.project_performance(params).await?)
            }
            ReportType::FinancialAnalysis => {
                ReportData::FinancialAnalysis(self.financial_analysis(params).await?)
            }
            ReportType::StaffPerformance => {
                ReportData::StaffPerformance(self.staff_performance(params).await?)
            }
            ReportType::KpiDashboard => ReportData::KpiDashboard(self.kpi_dashboard(params).await?),
            ReportType::ResourceUtilization => {
                ReportData::ResourceUtilization(self.resource_utilization(params).await?)
            }
            ReportType::ClientSummary => {
                ReportData::ClientSummary(self.client_summary(params).await?)
            }
        };
        Ok(data)
    }

    /// Record that a report was generated. Failures are logged, never returned.
    pub async fn log_report(&self, report_type: ReportType, parameters: &Value) {
        let result = sqlx::query(
            "INSERT INTO generated_reports (report_type, parameters, generated_by) VALUES ($1, $2, 'system')",
        )
        .bind(report_type.as_str())
        .bind(parameters)
        .execute(self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(report_type = report_type.as_str(), error = %e, "failed to log generated report");
        }
    }

    async fn executive_summary(&self, p: &ReportParams) -> Result<ExecutiveSummary, DbError> {
        let financial_sql = format!(
            r#"
            SELECT COALESCE(SUM(budget), 0)::float8 AS total_budget,
                   COALESCE(SUM(actual_cost), 0)::float8 AS total_expenses
            FROM projects
            WHERE UPPER(status) NOT IN {REPORT_EXCLUDED}
              AND ($1::date IS NULL OR created_at::date >= $1)
              AND ($2::date IS NULL OR created_at::date <= $2)
            "#
        );
        let financial = sqlx::query_as::<_, FinancialTotals>(&financial_sql)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_one(self.pool)
            .map_err(DbError::from);
        let staff = sqlx::query_as::<_, StaffTotals>(
            r#"
            SELECT COUNT(DISTINCT s.id) AS total_staff,
                   AVG(sp.productivity) AS avg_productivity,
                   AVG(sp.quality_score) AS avg_quality
            FROM staff s
            LEFT JOIN staff_performance sp ON sp.staff_id = s.id
            WHERE UPPER(s.status) = 'ACTIVE'
            "#,
        )
        .fetch_one(self.pool)
        .map_err(DbError::from);
        let kpis = sqlx::query_as::<_, MetricAverage>(
            r#"
            SELECT metric_type, AVG(metric_value) AS avg_value
            FROM kpi_metrics
            WHERE recorded_date >= COALESCE($1, CURRENT_DATE - 30)
            GROUP BY metric_type
            ORDER BY metric_type
            "#,
        )
        .bind(p.start_date)
        .fetch_all(self.pool)
        .map_err(DbError::from);

        let (projects, financial, staff, kpis) = tokio::try_join!(
            self.project_counts(p.start_date, p.end_date),
            financial,
            staff,
            kpis,
        )?;

        let highlights = analytics::highlights(&ExecutiveFigures {
            completed_projects: projects.completed,
            total_revenue: financial.total_budget,
            total_expenses: financial.total_expenses,
            avg_productivity: staff.avg_productivity,
        });

        Ok(ExecutiveSummary {
            overview: ExecutiveOverview {
                projects,
                financial,
                staff,
            },
            kpis,
            highlights,
        })
    }

    async fn project_performance(&self, p: &ReportParams) -> Result<ProjectPerformance, DbError> {
        let scope = format!(
            r#"
            UPPER(p.status) NOT IN {REPORT_EXCLUDED}
              AND ($1::uuid IS NULL OR p.id = $1)
              AND ($2::date IS NULL OR p.created_at::date >= $2)
              AND ($3::date IS NULL OR p.created_at::date <= $3)
            "#
        );

        let projects_sql = format!(
            r#"
            SELECT p.id, p.project_code, p.name, c.name AS client_name, p.status, p.progress,
                   p.start_date, p.end_date, p.budget::float8 AS budget,
                   p.actual_cost::float8 AS actual_cost
            FROM projects p
            LEFT JOIN clients c ON c.id = p.client_id
            WHERE {scope}
            ORDER BY p.end_date NULLS LAST, p.name
            "#
        );
        let timeline_sql = format!(
            r#"
            SELECT TO_CHAR(p.created_at, 'YYYY-MM') AS month,
                   COUNT(*) AS projects_started,
                   COUNT(*) FILTER (WHERE UPPER(p.status) = 'COMPLETED') AS projects_completed
            FROM projects p
            WHERE {scope}
            GROUP BY 1
            ORDER BY 1
            "#
        );
        let budget_sql = format!(
            r#"
            SELECT COALESCE(SUM(p.budget), 0)::float8 AS total_budget,
                   COALESCE(SUM(p.actual_cost), 0)::float8 AS total_spent,
                   AVG(CASE WHEN p.budget > 0 THEN p.actual_cost / p.budget * 100 ELSE 0 END)::float8
                       AS avg_utilization
            FROM projects p
            WHERE {scope}
            "#
        );

        let (mut projects, timeline, budget) = tokio::try_join!(
            sqlx::query_as::<_, ProjectRow>(&projects_sql)
                .bind(p.project_id)
                .bind(p.start_date)
                .bind(p.end_date)
                .fetch_all(self.pool),
            sqlx::query_as::<_, MonthlyProjects>(&timeline_sql)
                .bind(p.project_id)
                .bind(p.start_date)
                .bind(p.end_date)
                .fetch_all(self.pool),
            sqlx::query_as::<_, BudgetUse>(&budget_sql)
                .bind(p.project_id)
                .bind(p.start_date)
                .bind(p.end_date)
                .fetch_one(self.pool),
        )?;

        let today = Utc::now().date_naive();
        for project in &mut projects {
            project.performance_status = Some(PerformanceStatus::classify(
                project.end_date,
                today,
                &project.status,
                project.progress,
            ));
        }
        let progress: Vec<ProjectProgress<'_>> = projects
            .iter()
            .map(|row| ProjectProgress {
                status: &row.status,
                progress: row.progress,
                performance: row
                    .performance_status
                    .unwrap_or(PerformanceStatus::BehindSchedule),
            })
            .collect();
        let recommendations = analytics::project_recommendations(&progress);

        Ok(ProjectPerformance {
            projects,
            timeline,
            budget,
            recommendations,
        })
    }

    async fn financial_analysis(&self, p: &ReportParams) -> Result<FinancialReport, DbError> {
        let (revenue, monthly) = tokio::try_join!(
            sqlx::query_as::<_, ClientRevenue>(
                r#"
                SELECT c.id AS client_id, c.name AS client_name,
                       COUNT(p.id) AS project_count,
                       COALESCE(SUM(p.budget), 0)::float8 AS total_revenue
                FROM clients c
                JOIN projects p ON p.client_id = c.id
                WHERE ($1::uuid IS NULL OR c.id = $1)
                  AND ($2::date IS NULL OR p.created_at::date >= $2)
                  AND ($3::date IS NULL OR p.created_at::date <= $3)
                GROUP BY c.id, c.name
                ORDER BY total_revenue DESC
                "#,
            )
            .bind(p.client_id)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
            sqlx::query_as::<_, MonthlyFinance>(
                r#"
                SELECT TO_CHAR(p.created_at, 'YYYY-MM') AS month,
                       COALESCE(SUM(p.budget), 0)::float8 AS revenue,
                       COALESCE(SUM(p.actual_cost), 0)::float8 AS expenses,
                       COUNT(*) AS project_count
                FROM projects p
                WHERE ($1::uuid IS NULL OR p.client_id = $1)
                  AND ($2::date IS NULL OR p.created_at::date >= $2)
                  AND ($3::date IS NULL OR p.created_at::date <= $3)
                GROUP BY 1
                ORDER BY 1
                "#,
            )
            .bind(p.client_id)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
        )?;

        let revenue_series: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();
        let expense_series: Vec<f64> = monthly.iter().map(|m| m.expenses).collect();
        let analysis = analytics::financial_analysis(&revenue_series, &expense_series);

        Ok(FinancialReport {
            revenue,
            monthly,
            analysis,
        })
    }

    async fn staff_performance(&self, p: &ReportParams) -> Result<StaffReport, DbError> {
        let dept = p.department.as_deref();
        let (department_metrics, trends, top_performers) = tokio::try_join!(
            sqlx::query_as::<_, DepartmentMetrics>(
                r#"
                SELECT s.department,
                       COUNT(DISTINCT s.id) AS staff_count,
                       AVG(sp.productivity) AS avg_productivity,
                       AVG(sp.quality_score) AS avg_quality,
                       AVG(sp.safety_score) AS avg_safety,
                       SUM(sp.hours_worked) AS total_hours,
                       SUM(sp.tasks_completed)::int8 AS total_tasks
                FROM staff s
                LEFT JOIN staff_performance sp ON sp.staff_id = s.id
                     AND ($2::date IS NULL OR sp.period_start >= $2)
                     AND ($3::date IS NULL OR sp.period_start <= $3)
                WHERE UPPER(s.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                GROUP BY s.department
                ORDER BY s.department
                "#,
            )
            .bind(dept)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
            sqlx::query_as::<_, MonthlyPerformance>(
                r#"
                SELECT TO_CHAR(sp.period_start, 'YYYY-MM') AS month,
                       AVG(sp.productivity) AS avg_productivity,
                       AVG(sp.quality_score) AS avg_quality,
                       COUNT(DISTINCT sp.staff_id) AS active_staff
                FROM staff_performance sp
                JOIN staff s ON s.id = sp.staff_id
                WHERE UPPER(s.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                  AND ($2::date IS NULL OR sp.period_start >= $2)
                  AND ($3::date IS NULL OR sp.period_start <= $3)
                GROUP BY 1
                ORDER BY 1
                "#,
            )
            .bind(dept)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
            sqlx::query_as::<_, TopPerformer>(
                r#"
                SELECT s.id AS staff_id, s.name, s.position, s.department,
                       AVG(sp.productivity) AS avg_productivity,
                       AVG(sp.quality_score) AS avg_quality
                FROM staff s
                JOIN staff_performance sp ON sp.staff_id = s.id
                WHERE UPPER(s.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                  AND ($2::date IS NULL OR sp.period_start >= $2)
                  AND ($3::date IS NULL OR sp.period_start <= $3)
                GROUP BY s.id, s.name, s.position, s.department
                ORDER BY avg_productivity DESC NULLS LAST
                LIMIT 10
                "#,
            )
            .bind(dept)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
        )?;

        let productivity: Vec<Option<f64>> =
            department_metrics.iter().map(|d| d.avg_productivity).collect();
        let insights = analytics::staff_insights(&productivity);

        Ok(StaffReport {
            department_metrics,
            trends,
            top_performers,
            insights,
        })
    }

    async fn kpi_dashboard(&self, p: &ReportParams) -> Result<KpiReport, DbError> {
        let (current, historical, targets) = tokio::try_join!(
            sqlx::query_as::<_, CurrentKpi>(
                r#"
                SELECT metric_type, metric_name,
                       AVG(metric_value) AS current_value,
                       MIN(metric_value) AS min_value,
                       MAX(metric_value) AS max_value,
                       unit
                FROM kpi_metrics
                WHERE ($1::date IS NULL OR recorded_date >= $1)
                  AND ($2::date IS NULL OR recorded_date <= $2)
                GROUP BY metric_type, metric_name, unit
                ORDER BY metric_type, metric_name
                "#,
            )
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool)
            .map_err(DbError::from),
            sqlx::query_as::<_, MonthlyKpi>(
                r#"
                SELECT TO_CHAR(recorded_date, 'YYYY-MM') AS month,
                       metric_type,
                       AVG(metric_value) AS avg_value
                FROM kpi_metrics
                WHERE ($1::date IS NULL OR recorded_date >= $1)
                  AND ($2::date IS NULL OR recorded_date <= $2)
                GROUP BY 1, 2
                ORDER BY 1, 2
                "#,
            )
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool)
            .map_err(DbError::from),
            self.targets(true),
        )?;

        let values: Vec<(String, f64)> = current
            .iter()
            .map(|k| (k.metric_type.clone(), k.current_value))
            .collect();
        let target_map: BTreeMap<String, f64> = targets
            .iter()
            .map(|t| (t.kpi_id.clone(), t.target_value))
            .collect();
        let scorecard = analytics::kpi_scorecard(&values, &target_map);

        Ok(KpiReport {
            current,
            historical,
            targets,
            scorecard,
        })
    }

    async fn resource_utilization(&self, p: &ReportParams) -> Result<UtilizationReport, DbError> {
        let dept = p.department.as_deref();
        let (mut utilization, capacity, project_allocation) = tokio::try_join!(
            sqlx::query_as::<_, RoleUtilization>(
                r#"
                SELECT s.department, s.position,
                       COUNT(DISTINCT s.id) AS staff_count,
                       AVG(sp.hours_worked) AS avg_hours_worked
                FROM staff s
                LEFT JOIN staff_performance sp ON sp.staff_id = s.id
                     AND ($2::date IS NULL OR sp.period_start >= $2)
                     AND ($3::date IS NULL OR sp.period_start <= $3)
                WHERE UPPER(s.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                GROUP BY s.department, s.position
                ORDER BY s.department, s.position
                "#,
            )
            .bind(dept)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
            sqlx::query_as::<_, Capacity>(
                r#"
                SELECT COUNT(DISTINCT s.id) AS total_staff,
                       (COUNT(DISTINCT s.id) * $2::float8) AS total_capacity_hours,
                       COALESCE(SUM(sp.hours_worked), 0) AS total_hours_worked
                FROM staff s
                LEFT JOIN staff_performance sp ON sp.staff_id = s.id
                WHERE UPPER(s.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                "#,
            )
            .bind(dept)
            .bind(analytics::STANDARD_MONTHLY_HOURS)
            .fetch_one(self.pool),
            sqlx::query_as::<_, ProjectAllocation>(
                r#"
                SELECT p.name AS project_name,
                       COUNT(DISTINCT ps.staff_id) AS staff_assigned,
                       COALESCE(SUM(sp.hours_worked), 0) AS project_hours
                FROM projects p
                JOIN project_staff ps ON ps.project_id = p.id
                JOIN staff s ON s.id = ps.staff_id
                LEFT JOIN staff_performance sp ON sp.staff_id = s.id
                WHERE UPPER(p.status) = 'ACTIVE'
                  AND ($1::text IS NULL OR s.department = $1)
                GROUP BY p.id, p.name
                ORDER BY project_hours DESC
                LIMIT 10
                "#,
            )
            .bind(dept)
            .fetch_all(self.pool),
        )?;

        for row in &mut utilization {
            row.avg_utilization = analytics::utilization_percent(row.avg_hours_worked.unwrap_or(0.0));
        }
        let percents: Vec<f64> = utilization.iter().map(|u| u.avg_utilization).collect();
        let recommendations = analytics::utilization_recommendations(&percents);

        Ok(UtilizationReport {
            utilization,
            capacity,
            project_allocation,
            recommendations,
        })
    }

    async fn client_summary(&self, p: &ReportParams) -> Result<ClientReport, DbError> {
        let (clients, project_history) = tokio::try_join!(
            sqlx::query_as::<_, ClientTotals>(
                r#"
                SELECT c.id, c.name, c.status,
                       COUNT(p.id) AS total_projects,
                       COUNT(p.id) FILTER (WHERE UPPER(p.status) = 'ACTIVE') AS active_projects,
                       COUNT(p.id) FILTER (WHERE UPPER(p.status) = 'COMPLETED') AS completed_projects,
                       COALESCE(SUM(p.budget), 0)::float8 AS total_budget
                FROM clients c
                LEFT JOIN projects p ON p.client_id = c.id
                WHERE LOWER(c.status) <> 'deleted'
                  AND ($1::uuid IS NULL OR c.id = $1)
                GROUP BY c.id, c.name, c.status
                ORDER BY c.name
                "#,
            )
            .bind(p.client_id)
            .fetch_all(self.pool),
            sqlx::query_as::<_, ProjectHistory>(
                r#"
                SELECT p.name, p.status, p.start_date, p.end_date,
                       p.budget::float8 AS budget, p.progress
                FROM projects p
                WHERE ($1::uuid IS NULL OR p.client_id = $1)
                  AND ($2::date IS NULL OR p.created_at::date >= $2)
                  AND ($3::date IS NULL OR p.created_at::date <= $3)
                ORDER BY p.created_at DESC
                "#,
            )
            .bind(p.client_id)
            .bind(p.start_date)
            .bind(p.end_date)
            .fetch_all(self.pool),
        )?;

        let summary = clients
            .iter()
            .map(|c| ClientSummaryEntry {
                client_id: c.id,
                client_name: c.name.clone(),
                total_projects: c.total_projects,
                success_rate: analytics::success_rate(c.completed_projects, c.total_projects),
                total_value: c.total_budget,
            })
            .collect();

        Ok(ClientReport {
            clients,
            project_history,
            summary,
        })
    }
}
