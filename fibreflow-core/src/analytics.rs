//! Report classification and the derived insights attached to generated reports.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Monthly hours one staff member is expected to work
pub const STANDARD_MONTHLY_HOURS: f64 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    ExecutiveSummary,
    ProjectPerformance,
    FinancialAnalysis,
    StaffPerformance,
    KpiDashboard,
    ResourceUtilization,
    ClientSummary,
}

impl ReportType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "executive-summary" => Some(Self::ExecutiveSummary),
            "project-performance" => Some(Self::ProjectPerformance),
            "financial-analysis" => Some(Self::FinancialAnalysis),
            "staff-performance" => Some(Self::StaffPerformance),
            "kpi-dashboard" => Some(Self::KpiDashboard),
            "resource-utilization" => Some(Self::ResourceUtilization),
            "client-summary" => Some(Self::ClientSummary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "executive-summary",
            Self::ProjectPerformance => "project-performance",
            Self::FinancialAnalysis => "financial-analysis",
            Self::StaffPerformance => "staff-performance",
            Self::KpiDashboard => "kpi-dashboard",
            Self::ResourceUtilization => "resource-utilization",
            Self::ClientSummary => "client-summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceStatus {
    Overdue,
    NearCompletion,
    OnTrack,
    BehindSchedule,
}

impl PerformanceStatus {
    /// First matching rule wins: overdue, near completion (≥ 90), on track (≥ 50).
    pub fn classify(end_date: Option<NaiveDate>, today: NaiveDate, status: &str, progress: f64) -> Self {
        let completed = status.eq_ignore_ascii_case("completed");
        if end_date.is_some_and(|end| end < today) && !completed {
            Self::Overdue
        } else if progress >= 90.0 {
            Self::NearCompletion
        } else if progress >= 50.0 {
            Self::OnTrack
        } else {
            Self::BehindSchedule
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::NearCompletion => "near-completion",
            Self::OnTrack => "on-track",
            Self::BehindSchedule => "behind-schedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: String,
    pub area: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Headline figures for the executive summary
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecutiveFigures {
    pub completed_projects: i64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub avg_productivity: Option<f64>,
}

pub fn profit_margin(revenue: f64, expenses: f64) -> f64 {
    if revenue > 0.0 {
        (revenue - expenses) / revenue * 100.0
    } else {
        0.0
    }
}

pub fn highlights(f: &ExecutiveFigures) -> Vec<String> {
    let mut out = Vec::new();

    if f.completed_projects > 10 {
        out.push(format!("Successfully completed {} projects", f.completed_projects));
    }

    let margin = profit_margin(f.total_revenue, f.total_expenses);
    if margin > 20.0 {
        out.push(format!("Achieved {}% profit margin", margin.round()));
    }

    if let Some(p) = f.avg_productivity.filter(|p| *p > 85.0) {
        out.push(format!("Staff productivity at {}%", p.round()));
    }

    out
}

/// Minimal view of a project row for recommendations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectProgress<'a> {
    pub status: &'a str,
    pub progress: f64,
    pub performance: PerformanceStatus,
}

pub fn project_recommendations(projects: &[ProjectProgress<'_>]) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let overdue = projects
        .iter()
        .filter(|p| p.performance == PerformanceStatus::Overdue)
        .count();
    if overdue > 0 {
        out.push(Recommendation {
            priority: "high".into(),
            area: "timeline".into(),
            recommendation: format!(
                "{} projects are overdue. Consider resource reallocation.",
                overdue
            ),
        });
    }

    let slow = projects
        .iter()
        .filter(|p| p.progress < 30.0 && p.status.eq_ignore_ascii_case("active"))
        .count();
    if slow > 0 {
        out.push(Recommendation {
            priority: "medium".into(),
            area: "progress".into(),
            recommendation: format!("{} active projects have less than 30% progress.", slow),
        });
    }

    out
}

/// Percentage change from the first to the last value; zero for fewer than
/// two points or a non-positive start.
pub fn growth_rate(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) if series.len() >= 2 && *first > 0.0 => {
            (last - first) / first * 100.0
        }
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTrends {
    pub revenue_growth: f64,
    pub expense_growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub summary: FinancialSummary,
    pub trends: FinancialTrends,
}

/// Summarize per-period revenue and expense series.
pub fn financial_analysis(revenue: &[f64], expenses: &[f64]) -> FinancialAnalysis {
    let total_revenue: f64 = revenue.iter().sum();
    let total_expenses: f64 = expenses.iter().sum();
    FinancialAnalysis {
        summary: FinancialSummary {
            total_revenue,
            total_expenses,
            net_profit: total_revenue - total_expenses,
            profit_margin: profit_margin(total_revenue, total_expenses),
        },
        trends: FinancialTrends {
            revenue_growth: growth_rate(revenue),
            expense_growth: growth_rate(expenses),
        },
    }
}

/// Warn when mean departmental productivity is below 70.
pub fn staff_insights(department_productivity: &[Option<f64>]) -> Vec<Insight> {
    if department_productivity.is_empty() {
        return Vec::new();
    }
    let sum: f64 = department_productivity.iter().map(|p| p.unwrap_or(0.0)).sum();
    let avg = sum / department_productivity.len() as f64;

    if avg < 70.0 {
        vec![Insight {
            kind: "warning".into(),
            message: "Average productivity below target. Consider training programs.".into(),
        }]
    } else {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardEntry {
    pub current: f64,
    pub target: f64,
    pub status: String,
    pub variance: f64,
}

/// Compare current KPI values against targets keyed by the same metric.
/// Metrics without a target are left out.
pub fn kpi_scorecard(
    current: &[(String, f64)],
    targets: &BTreeMap<String, f64>,
) -> BTreeMap<String, ScorecardEntry> {
    current
        .iter()
        .filter_map(|(metric, value)| {
            let target = *targets.get(metric)?;
            let variance = if target != 0.0 {
                (value - target) / target * 100.0
            } else {
                0.0
            };
            Some((
                metric.clone(),
                ScorecardEntry {
                    current: *value,
                    target,
                    status: if *value >= target { "achieved" } else { "below-target" }.into(),
                    variance,
                },
            ))
        })
        .collect()
}

/// Hours worked as a percentage of a standard month.
pub fn utilization_percent(hours_worked: f64) -> f64 {
    if hours_worked > 0.0 {
        hours_worked / STANDARD_MONTHLY_HOURS * 100.0
    } else {
        0.0
    }
}

pub fn utilization_recommendations(utilization: &[f64]) -> Vec<Insight> {
    let under = utilization.iter().filter(|u| **u < 70.0).count();
    if under == 0 {
        return Vec::new();
    }
    vec![Insight {
        kind: "optimization".into(),
        message: format!(
            "{} departments/roles are under-utilized. Consider workload redistribution.",
            under
        ),
    }]
}

pub fn success_rate(completed: i64, total: i64) -> f64 {
    if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn report_types_round_trip_names() {
        for name in [
            "executive-summary",
            "project-performance",
            "financial-analysis",
            "staff-performance",
            "kpi-dashboard",
            "resource-utilization",
            "client-summary",
        ] {
            assert_eq!(ReportType::parse(name).unwrap().as_str(), name);
        }
        assert!(ReportType::parse("weekly").is_none());
    }

    #[test]
    fn performance_status_order() {
        let today = day(2025, 6, 1);
        let past = Some(day(2025, 1, 1));
        assert_eq!(PerformanceStatus::classify(past, today, "ACTIVE", 95.0), PerformanceStatus::Overdue);
        assert_eq!(PerformanceStatus::classify(past, today, "COMPLETED", 95.0), PerformanceStatus::NearCompletion);
        assert_eq!(PerformanceStatus::classify(None, today, "ACTIVE", 50.0), PerformanceStatus::OnTrack);
        assert_eq!(PerformanceStatus::classify(None, today, "ACTIVE", 49.9), PerformanceStatus::BehindSchedule);
    }

    #[test]
    fn highlights_thresholds() {
        let f = ExecutiveFigures {
            completed_projects: 11,
            total_revenue: 100.0,
            total_expenses: 70.0,
            avg_productivity: Some(90.4),
        };
        let h = highlights(&f);
        assert_eq!(h.len(), 3);
        assert_eq!(h[1], "Achieved 30% profit margin");

        assert!(highlights(&ExecutiveFigures::default()).is_empty());
    }

    #[test]
    fn recommendations_count_overdue_and_slow() {
        let projects = [
            ProjectProgress { status: "ACTIVE", progress: 10.0, performance: PerformanceStatus::Overdue },
            ProjectProgress { status: "ACTIVE", progress: 20.0, performance: PerformanceStatus::BehindSchedule },
            ProjectProgress { status: "ON_HOLD", progress: 5.0, performance: PerformanceStatus::BehindSchedule },
        ];
        let recs = project_recommendations(&projects);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].recommendation.starts_with("1 projects"));
        assert!(recs[1].recommendation.starts_with("2 active"));
    }

    #[test]
    fn growth_and_financials() {
        assert_eq!(growth_rate(&[100.0, 150.0]), 50.0);
        assert_eq!(growth_rate(&[100.0]), 0.0);
        assert_eq!(growth_rate(&[0.0, 10.0]), 0.0);

        let a = financial_analysis(&[100.0, 200.0], &[50.0, 50.0]);
        assert_eq!(a.summary.net_profit, 200.0);
        assert!((a.summary.profit_margin - 66.666).abs() < 0.01);
        assert_eq!(a.trends.revenue_growth, 100.0);
    }

    #[test]
    fn staff_and_utilization_insights() {
        assert_eq!(staff_insights(&[Some(60.0), None]).len(), 1);
        assert!(staff_insights(&[Some(80.0)]).is_empty());
        assert!(staff_insights(&[]).is_empty());

        assert_eq!(utilization_percent(80.0), 50.0);
        let recs = utilization_recommendations(&[50.0, 90.0, 10.0]);
        assert!(recs[0].message.starts_with("2 departments"));
    }

    #[test]
    fn scorecard_variance() {
        let targets = BTreeMap::from([("uptime".to_string(), 99.0), ("zero".to_string(), 0.0)]);
        let current = vec![
            ("uptime".to_string(), 99.0),
            ("zero".to_string(), 1.0),
            ("untargeted".to_string(), 5.0),
        ];
        let card = kpi_scorecard(&current, &targets);
        assert_eq!(card.len(), 2);
        assert_eq!(card["uptime"].status, "achieved");
        assert_eq!(card["zero"].variance, 0.0);
        assert_eq!(success_rate(3, 4), 75.0);
    }
}
