//! RAG score persistence
//!
//! Metrics are gathered here and scored by `fibreflow_core::rag`. Score
//! writes lock the contractor row so a calculation and a manual override
//! cannot interleave.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fibreflow_core::rag::{
    self, ComplianceMetrics, Evaluation, FinancialMetrics, PerformanceMetrics, RagFactor,
    RagScore, SafetyMetrics, ScoreType, REQUIRED_DOCUMENT_TYPES,
};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::DbError;

/// History reason for scores written by a calculation
const CALCULATION_REASON: &str = "Automated RAG score calculation";

/// History reason when a manual sub-score change moves the overall score
const OVERALL_RECALCULATED: &str = "Automatically recalculated based on individual scores";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RagHistoryEntry {
    pub id: Uuid,
    pub score_type: String,
    pub old_score: Option<String>,
    pub new_score: String,
    pub reason: Option<String>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredFactor {
    pub factor_type: String,
    pub factor_name: String,
    pub factor_value: serde_json::Value,
    pub impact_on_score: Option<String>,
    pub last_evaluated: DateTime<Utc>,
}

/// Counts shown beside the current scores
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct RagMetricsSummary {
    pub total_projects: i64,
    pub completed_projects: i64,
    pub active_projects: i64,
    pub approved_documents: i64,
    pub rejected_documents: i64,
    pub expired_documents: i64,
}

/// The five stored scores; unknown or missing values read as amber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RagScores {
    pub overall: RagScore,
    pub financial: RagScore,
    pub compliance: RagScore,
    pub performance: RagScore,
    pub safety: RagScore,
}

impl RagScores {
    pub fn get(&self, t: ScoreType) -> RagScore {
        match t {
            ScoreType::Overall => self.overall,
            ScoreType::Financial => self.financial,
            ScoreType::Compliance => self.compliance,
            ScoreType::Performance => self.performance,
            ScoreType::Safety => self.safety,
        }
    }

    pub fn set(&mut self, t: ScoreType, score: RagScore) {
        match t {
            ScoreType::Overall => self.overall = score,
            ScoreType::Financial => self.financial = score,
            ScoreType::Compliance => self.compliance = score,
            ScoreType::Performance => self.performance = score,
            ScoreType::Safety => self.safety = score,
        }
    }

    /// Worst of the four sub-scores.
    pub fn worst_component(&self) -> RagScore {
        rag::overall(ScoreType::COMPONENTS.iter().map(|t| self.get(*t)))
    }
}

#[derive(Debug, Clone, FromRow)]
struct ScoreRow {
    id: Uuid,
    company_name: String,
    rag_overall: String,
    rag_financial: String,
    rag_compliance: String,
    rag_performance: String,
    rag_safety: String,
    rag_last_updated: Option<DateTime<Utc>>,
    rag_updated_by: Option<String>,
}

impl ScoreRow {
    fn scores(&self) -> RagScores {
        let parse = |s: &str| RagScore::parse(s).unwrap_or_default();
        RagScores {
            overall: parse(&self.rag_overall),
            financial: parse(&self.rag_financial),
            compliance: parse(&self.rag_compliance),
            performance: parse(&self.rag_performance),
            safety: parse(&self.rag_safety),
        }
    }
}

const SCORE_COLUMNS: &str = "id, company_name, rag_overall, rag_financial, rag_compliance, \
     rag_performance, rag_safety, rag_last_updated, rag_updated_by";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentScores {
    pub contractor_id: Uuid,
    pub company_name: String,
    pub scores: RagScores,
    pub last_updated: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagSnapshot {
    pub current: CurrentScores,
    pub factors: Vec<StoredFactor>,
    pub metrics: RagMetricsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<RagHistoryEntry>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagCalculation {
    pub contractor_id: Uuid,
    pub company_name: String,
    /// Calculated sub-scores plus `overall`
    pub scores: BTreeMap<&'static str, RagScore>,
    pub factors: Vec<RagFactor>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualUpdate {
    pub contractor_id: Uuid,
    pub company_name: String,
    pub score_type: ScoreType,
    pub old_score: RagScore,
    pub new_score: RagScore,
    pub scores: RagScores,
    pub updated_at: DateTime<Utc>,
}

/// RAG repository
pub struct RagRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RagRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn score_row(&self, id: Uuid) -> Result<ScoreRow, DbError> {
        sqlx::query_as::<_, ScoreRow>(&format!(
            "SELECT {} FROM contractors WHERE id = $1",
            SCORE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("contractor", id))
    }

    async fn lock_score_row(conn: &mut PgConnection, id: Uuid) -> Result<ScoreRow, DbError> {
        sqlx::query_as::<_, ScoreRow>(&format!(
            "SELECT {} FROM contractors WHERE id = $1 FOR UPDATE",
            SCORE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("contractor", id))
    }

    /// Latest score changes, newest first.
    pub async fn history(&self, id: Uuid, limit: i64) -> Result<Vec<RagHistoryEntry>, DbError> {
        let rows = sqlx::query_as::<_, RagHistoryEntry>(
            r#"
            SELECT id, score_type, old_score, new_score, reason, updated_by, created_at
            FROM contractor_rag_history
            WHERE contractor_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn factors(&self, id: Uuid) -> Result<Vec<StoredFactor>, DbError> {
        let rows = sqlx::query_as::<_, StoredFactor>(
            r#"
            SELECT factor_type, factor_name, factor_value, impact_on_score, last_evaluated
            FROM contractor_rag_factors
            WHERE contractor_id = $1
            ORDER BY factor_type, factor_name
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn metrics_summary(&self, id: Uuid) -> Result<RagMetricsSummary, DbError> {
        let m = sqlx::query_as::<_, RagMetricsSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM project_assignments WHERE contractor_id = $1) AS total_projects,
                (SELECT COUNT(*) FROM project_assignments
                  WHERE contractor_id = $1 AND status = 'completed') AS completed_projects,
                (SELECT COUNT(*) FROM project_assignments
                  WHERE contractor_id = $1 AND status = 'active') AS active_projects,
                (SELECT COUNT(*) FROM contractor_documents
                  WHERE contractor_id = $1 AND status = 'approved') AS approved_documents,
                (SELECT COUNT(*) FROM contractor_documents
                  WHERE contractor_id = $1 AND status = 'rejected') AS rejected_documents,
                (SELECT COUNT(*) FROM contractor_documents
                  WHERE contractor_id = $1 AND expiry_date < CURRENT_DATE) AS expired_documents
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(m)
    }

    /// Current scores, stored factors and supporting counts.
    pub async fn snapshot(&self, id: Uuid, include_history: bool) -> Result<RagSnapshot, DbError> {
        let (row, factors, metrics) =
            tokio::try_join!(self.score_row(id), self.factors(id), self.metrics_summary(id))?;
        let history = if include_history {
            Some(self.history(id, 50).await?)
        } else {
            None
        };

        Ok(RagSnapshot {
            current: CurrentScores {
                contractor_id: row.id,
                company_name: row.company_name.clone(),
                scores: row.scores(),
                last_updated: row.rag_last_updated,
                updated_by: row.rag_updated_by,
            },
            factors,
            metrics,
            history,
        })
    }

    async fn financial_metrics(&self, id: Uuid) -> Result<FinancialMetrics, DbError> {
        let (insurance_coverage, bonding_capacity, years_in_business, overdue_projects): (
            Option<Decimal>,
            Option<Decimal>,
            Option<i32>,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT c.insurance_coverage, c.bonding_capacity, c.years_in_business,
                   (SELECT COUNT(*) FROM project_assignments pa
                     WHERE pa.contractor_id = c.id AND pa.payment_status = 'overdue')
            FROM contractors c
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("contractor", id))?;

        Ok(FinancialMetrics {
            insurance_coverage,
            bonding_capacity,
            overdue_projects,
            years_in_business,
        })
    }

    async fn compliance_metrics(&self, id: Uuid) -> Result<ComplianceMetrics, DbError> {
        let (total, approved, rejected, expired, required_approved, compliance_status): (
            i64,
            i64,
            i64,
            i64,
            i64,
            Option<String>,
        ) = sqlx::query_as(
            r#"
            SELECT COUNT(d.id),
                   COUNT(d.id) FILTER (WHERE d.status = 'approved'),
                   COUNT(d.id) FILTER (WHERE d.status = 'rejected'),
                   COUNT(d.id) FILTER (WHERE d.expiry_date < CURRENT_DATE),
                   COUNT(DISTINCT d.document_type)
                       FILTER (WHERE d.status = 'approved' AND d.document_type = ANY($2)),
                   c.compliance_status
            FROM contractors c
            LEFT JOIN contractor_documents d ON d.contractor_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            "#,
        )
        .bind(id)
        .bind(&REQUIRED_DOCUMENT_TYPES[..])
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("contractor", id))?;

        Ok(ComplianceMetrics {
            total_documents: total,
            approved_documents: approved,
            rejected_documents: rejected,
            expired_documents: expired,
            required_approved,
            compliance_status,
        })
    }

    async fn performance_metrics(&self, id: Uuid) -> Result<PerformanceMetrics, DbError> {
        let (total, completed, cancelled, avg_schedule): (i64, i64, i64, Option<f64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE status = 'completed'),
                       COUNT(*) FILTER (WHERE status = 'cancelled'),
                       AVG(CASE WHEN status = 'completed' AND actual_end_date IS NOT NULL
                                THEN (actual_end_date - start_date)::float8
                                     / NULLIF(end_date - start_date, 0)
                           END)::float8
                FROM project_assignments
                WHERE contractor_id = $1
                "#,
            )
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(PerformanceMetrics {
            total_projects: total,
            completed_projects: completed,
            cancelled_projects: cancelled,
            avg_schedule_performance: avg_schedule,
        })
    }

    async fn safety_metrics(&self, id: Uuid) -> Result<SafetyMetrics, DbError> {
        let (safety_certs, incidents, high_severity): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM contractor_documents
                  WHERE contractor_id = $1 AND document_type = 'safety_certification'
                    AND status = 'approved'),
                (SELECT COUNT(*) FROM contractor_safety_incidents
                  WHERE contractor_id = $1 AND incident_date > CURRENT_DATE - INTERVAL '1 year'),
                (SELECT COUNT(*) FROM contractor_safety_incidents
                  WHERE contractor_id = $1 AND severity = 'high'
                    AND incident_date > CURRENT_DATE - INTERVAL '1 year')
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(SafetyMetrics {
            safety_certs,
            incidents,
            high_severity_incidents: high_severity,
        })
    }

    async fn evaluate(&self, id: Uuid, t: ScoreType) -> Result<(ScoreType, Evaluation), DbError> {
        let eval = match t {
            ScoreType::Financial => rag::score_financial(&self.financial_metrics(id).await?),
            ScoreType::Compliance => rag::score_compliance(&self.compliance_metrics(id).await?),
            ScoreType::Performance => rag::score_performance(&self.performance_metrics(id).await?),
            ScoreType::Safety => rag::score_safety(&self.safety_metrics(id).await?),
            ScoreType::Overall => {
                return Err(DbError::InvalidInput(
                    "overall is derived, not evaluated".into(),
                ))
            }
        };
        Ok((t, eval))
    }

    /// Evaluate the given sub-scores, store them with their factors and
    /// recompute the overall score.
    pub async fn calculate(
        &self,
        id: Uuid,
        components: &[ScoreType],
        triggered_by: &str,
    ) -> Result<RagCalculation, DbError> {
        self.score_row(id).await?;
        let evaluations = try_join_all(components.iter().map(|t| self.evaluate(id, *t))).await?;

        let mut tx = self.pool.begin().await?;
        let row = Self::lock_score_row(&mut tx, id).await?;
        let stored = row.scores();
        let mut updated = stored;
        let mut scores = BTreeMap::new();
        let mut factors = Vec::new();

        for (t, eval) in evaluations {
            updated.set(t, eval.score);
            scores.insert(t.as_str(), eval.score);
            factors.extend(eval.factors);
        }
        updated.overall = updated.worst_component();
        scores.insert(ScoreType::Overall.as_str(), updated.overall);

        for t in std::iter::once(ScoreType::Overall).chain(components.iter().copied()) {
            let (old, new) = (stored.get(t), updated.get(t));
            if old != new {
                set_column(&mut tx, id, t, new).await?;
                record_history(
                    &mut tx,
                    id,
                    t.as_str(),
                    Some(old.as_str()),
                    new.as_str(),
                    Some(CALCULATION_REASON),
                    triggered_by,
                )
                .await?;
            }
        }

        let evaluated: Vec<&str> = components.iter().map(|t| t.as_str()).collect();
        sqlx::query(
            "DELETE FROM contractor_rag_factors WHERE contractor_id = $1 AND factor_type = ANY($2)",
        )
        .bind(id)
        .bind(&evaluated[..])
        .execute(&mut *tx)
        .await?;

        for factor in &factors {
            sqlx::query(
                r#"
                INSERT INTO contractor_rag_factors (
                    contractor_id, factor_type, factor_name, factor_value, impact_on_score
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (contractor_id, factor_type, factor_name) DO UPDATE SET
                    factor_value = EXCLUDED.factor_value,
                    impact_on_score = EXCLUDED.impact_on_score,
                    last_evaluated = NOW()
                "#,
            )
            .bind(id)
            .bind(factor.score_type.as_str())
            .bind(&factor.name)
            .bind(&factor.value)
            .bind(factor.impact.as_str())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE contractors SET rag_last_updated = NOW(), rag_updated_by = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(triggered_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            contractor_id = %id,
            overall = %updated.overall,
            factors = factors.len(),
            "RAG scores calculated"
        );

        Ok(RagCalculation {
            contractor_id: row.id,
            company_name: row.company_name,
            scores,
            factors,
            calculated_at: Utc::now(),
        })
    }

    /// Manually set one score. Changing a sub-score re-derives the overall.
    pub async fn set_score(
        &self,
        id: Uuid,
        score_type: ScoreType,
        score: RagScore,
        reason: Option<&str>,
        updated_by: &str,
    ) -> Result<ManualUpdate, DbError> {
        let mut tx = self.pool.begin().await?;
        let row = Self::lock_score_row(&mut tx, id).await?;
        let stored = row.scores();
        let old_score = stored.get(score_type);
        let mut scores = stored;
        scores.set(score_type, score);

        set_column(&mut tx, id, score_type, score).await?;
        sqlx::query(
            "UPDATE contractors SET rag_last_updated = NOW(), rag_updated_by = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(updated_by)
        .execute(&mut *tx)
        .await?;
        record_history(
            &mut tx,
            id,
            score_type.as_str(),
            Some(old_score.as_str()),
            score.as_str(),
            reason,
            updated_by,
        )
        .await?;

        if score_type != ScoreType::Overall {
            let overall = scores.worst_component();
            if overall != stored.overall {
                scores.overall = overall;
                set_column(&mut tx, id, ScoreType::Overall, overall).await?;
                record_history(
                    &mut tx,
                    id,
                    ScoreType::Overall.as_str(),
                    Some(stored.overall.as_str()),
                    overall.as_str(),
                    Some(OVERALL_RECALCULATED),
                    "system",
                )
                .await?;
            }
        }

        tx.commit().await?;

        Ok(ManualUpdate {
            contractor_id: row.id,
            company_name: row.company_name,
            score_type,
            old_score,
            new_score: score,
            scores,
            updated_at: Utc::now(),
        })
    }

    /// Ids of active contractors, for bulk recalculation.
    pub async fn active_contractor_ids(&self) -> Result<Vec<Uuid>, DbError> {
        let ids = sqlx::query_scalar("SELECT id FROM contractors WHERE is_active ORDER BY company_name")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }
}

/// `t.column()` is one of five fixed column names.
async fn set_column(
    conn: &mut PgConnection,
    id: Uuid,
    t: ScoreType,
    score: RagScore,
) -> Result<(), DbError> {
    sqlx::query(&format!(
        "UPDATE contractors SET {} = $2, updated_at = NOW() WHERE id = $1",
        t.column()
    ))
    .bind(id)
    .bind(score.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

async fn record_history(
    conn: &mut PgConnection,
    id: Uuid,
    score_type: &str,
    old: Option<&str>,
    new: &str,
    reason: Option<&str>,
    updated_by: &str,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO contractor_rag_history (
            contractor_id, score_type, old_score, new_score, reason, updated_by
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(score_type)
    .bind(old)
    .bind(new)
    .bind(reason)
    .bind(updated_by)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(overall: &str, financial: &str) -> ScoreRow {
        ScoreRow {
            id: Uuid::nil(),
            company_name: "Velocity".into(),
            rag_overall: overall.into(),
            rag_financial: financial.into(),
            rag_compliance: "green".into(),
            rag_performance: "green".into(),
            rag_safety: "bogus".into(),
            rag_last_updated: None,
            rag_updated_by: None,
        }
    }

    #[test]
    fn unknown_stored_scores_read_as_amber() {
        let scores = row("green", "red").scores();
        assert_eq!(scores.safety, RagScore::Amber);
        assert_eq!(scores.financial, RagScore::Red);
    }

    #[test]
    fn worst_component_ignores_stored_overall() {
        let mut scores = row("red", "green").scores();
        scores.set(ScoreType::Safety, RagScore::Green);
        assert_eq!(scores.worst_component(), RagScore::Green);
        scores.set(ScoreType::Compliance, RagScore::Amber);
        assert_eq!(scores.worst_component(), RagScore::Amber);
    }

    #[test]
    fn calculation_serializes_camel_case() {
        let calc = RagCalculation {
            contractor_id: Uuid::nil(),
            company_name: "Velocity".into(),
            scores: BTreeMap::from([("overall", RagScore::Red), ("safety", RagScore::Red)]),
            factors: Vec::new(),
            calculated_at: Utc::now(),
        };
        let json = serde_json::to_value(&calc).unwrap();
        assert_eq!(json["companyName"], "Velocity");
        assert_eq!(json["scores"]["overall"], "red");
        assert!(json.get("calculatedAt").is_some());
    }
}
