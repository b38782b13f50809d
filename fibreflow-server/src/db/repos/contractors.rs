//! Contractor repository: contractors, teams, compliance documents, safety
//! incidents and project assignments
//!
//! RAG scores live on the contractor row but are written through
//! [`super::RagRepo`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::rag::RagHistoryEntry;
use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_CONTRACTOR: &str =
    "A contractor with this registration number or email already exists";
const DUPLICATE_EMAIL: &str = "A contractor with this email already exists";

/// Contractor record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contractor {
    pub id: Uuid,
    pub company_name: String,
    pub registration_number: String,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub physical_address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub business_type: Option<String>,
    pub industry_category: Option<String>,
    pub years_in_business: Option<i32>,
    pub employee_count: Option<i32>,
    pub annual_turnover: Option<Decimal>,
    pub insurance_coverage: Option<Decimal>,
    pub bonding_capacity: Option<Decimal>,
    pub status: String,
    pub is_active: bool,
    pub compliance_status: String,
    pub rag_overall: String,
    pub rag_financial: String,
    pub rag_compliance: String,
    pub rag_performance: String,
    pub rag_safety: String,
    pub rag_last_updated: Option<DateTime<Utc>>,
    pub rag_updated_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContractorTeam {
    pub id: Uuid,
    pub contractor_id: Uuid,
    pub team_name: String,
    pub team_type: Option<String>,
    pub specialization: Option<String>,
    pub max_capacity: i32,
    pub current_capacity: i32,
    pub availability: String,
    pub base_location: Option<String>,
    pub is_active: bool,
    #[sqlx(default)]
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContractorDocument {
    pub id: Uuid,
    pub contractor_id: Uuid,
    pub document_type: String,
    pub document_name: String,
    pub document_number: Option<String>,
    pub file_url: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: String,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SafetyIncident {
    pub id: Uuid,
    pub contractor_id: Uuid,
    pub project_id: Option<Uuid>,
    pub incident_date: NaiveDate,
    pub severity: String,
    pub description: String,
    pub reported_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectAssignment {
    pub id: Uuid,
    pub contractor_id: Uuid,
    pub project_id: Uuid,
    #[sqlx(default)]
    pub project_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub scope: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub actual_end_date: Option<NaiveDate>,
    pub contract_value: Decimal,
    pub status: String,
    pub payment_status: String,
    pub progress_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DocumentCount {
    pub document_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ProjectStats {
    pub active_projects: i64,
    pub completed_projects: i64,
    pub total_projects: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractorDetail {
    #[serde(flatten)]
    pub contractor: Contractor,
    pub teams: Vec<ContractorTeam>,
    pub documents: Vec<DocumentCount>,
    pub project_stats: ProjectStats,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct AssignmentMetrics {
    pub total_projects: i64,
    pub active_projects: i64,
    pub completed_projects: i64,
    pub cancelled_projects: i64,
    pub avg_progress: Option<f64>,
    pub avg_schedule_performance: Option<f64>,
    pub total_contract_value: Decimal,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct DocumentMetrics {
    pub total_documents: i64,
    pub approved_documents: i64,
    pub pending_documents: i64,
    pub rejected_documents: i64,
    pub expired_documents: i64,
    pub document_types: i64,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct TeamMetrics {
    pub total_teams: i64,
    pub total_team_members: i64,
    pub team_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractorAnalytics {
    pub contractor_id: Uuid,
    pub company_name: String,
    pub project_metrics: AssignmentMetrics,
    pub document_metrics: DocumentMetrics,
    pub team_metrics: TeamMetrics,
    pub rag_history: Vec<RagHistoryEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct NewContractor {
    pub company_name: String,
    pub registration_number: String,
    pub contact_person: String,
    pub email: String,
    pub phone: Option<String>,
    pub physical_address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub business_type: Option<String>,
    pub industry_category: Option<String>,
    pub years_in_business: Option<i32>,
    pub employee_count: Option<i32>,
    pub annual_turnover: Option<Decimal>,
    pub insurance_coverage: Option<Decimal>,
    pub bonding_capacity: Option<Decimal>,
    pub status: String,
    pub compliance_status: String,
    pub notes: Option<String>,
}

/// Fields present in a PUT body; absent fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ContractorChanges {
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub physical_address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub business_type: Option<String>,
    pub industry_category: Option<String>,
    pub years_in_business: Option<i32>,
    pub employee_count: Option<i32>,
    pub annual_turnover: Option<Decimal>,
    pub insurance_coverage: Option<Decimal>,
    pub bonding_capacity: Option<Decimal>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub compliance_status: Option<String>,
    pub notes: Option<String>,
}

impl ContractorChanges {
    fn push_sets(&self, qb: &mut QueryBuilder<'_, Postgres>) -> usize {
        let changes = self;
        let mut count = 0;
        let mut set = qb.separated(", ");

        macro_rules! set_column {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(v) = &changes.$field {
                        set.push(concat!(stringify!($field), " = "));
                        set.push_bind_unseparated(v.clone());
                        count += 1;
                    }
                )*
            };
        }

        set_column!(
            company_name,
            registration_number,
            contact_person,
            email,
            phone,
            physical_address,
            city,
            province,
            business_type,
            industry_category,
            years_in_business,
            employee_count,
            annual_turnover,
            insurance_coverage,
            bonding_capacity,
            status,
            is_active,
            compliance_status,
            notes,
        );

        if count > 0 {
            set.push("updated_at = NOW()");
        }
        count
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContractorFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub rag: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTeam {
    pub team_name: String,
    pub team_type: Option<String>,
    pub specialization: Option<String>,
    pub max_capacity: i32,
    pub availability: String,
    pub base_location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub document_type: String,
    pub document_name: String,
    pub document_number: Option<String>,
    pub file_url: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentReview {
    pub status: String,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub project_id: Option<Uuid>,
    pub incident_date: Option<NaiveDate>,
    pub severity: String,
    pub description: String,
    pub reported_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub project_id: Uuid,
    pub team_id: Option<Uuid>,
    pub scope: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contract_value: Decimal,
    pub status: String,
    pub payment_status: String,
}

/// Contractor repository
pub struct ContractorRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ContractorRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ContractorFilter,
        page: Pagination,
    ) -> Result<Paginated<Contractor>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM contractors
            WHERE ($1::text IS NULL
                   OR company_name ILIKE $1 OR contact_person ILIKE $1
                   OR email ILIKE $1 OR registration_number ILIKE $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR rag_overall = $3)
              AND ($4::boolean IS NULL OR is_active = $4)
            ORDER BY company_name
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.status.as_deref())
        .bind(filter.rag.as_deref())
        .bind(filter.active)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, c: &NewContractor) -> Result<Contractor, DbError> {
        sqlx::query_as::<_, Contractor>(
            r#"
            INSERT INTO contractors (
                company_name, registration_number, contact_person, email, phone,
                physical_address, city, province, business_type, industry_category,
                years_in_business, employee_count, annual_turnover, insurance_coverage,
                bonding_capacity, status, compliance_status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(&c.company_name)
        .bind(&c.registration_number)
        .bind(&c.contact_person)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.physical_address)
        .bind(&c.city)
        .bind(&c.province)
        .bind(&c.business_type)
        .bind(&c.industry_category)
        .bind(c.years_in_business)
        .bind(c.employee_count)
        .bind(c.annual_turnover)
        .bind(c.insurance_coverage)
        .bind(c.bonding_capacity)
        .bind(&c.status)
        .bind(&c.compliance_status)
        .bind(&c.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_CONTRACTOR))
    }

    pub async fn get(&self, id: Uuid) -> Result<Contractor, DbError> {
        sqlx::query_as::<_, Contractor>("SELECT * FROM contractors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("contractor", id))
    }

    /// Contractor with teams, document counts per type and project stats.
    pub async fn get_detail(&self, id: Uuid) -> Result<ContractorDetail, DbError> {
        let (contractor, teams, documents, project_stats) = tokio::try_join!(
            self.get(id),
            self.teams_of(id),
            self.document_counts(id),
            self.project_stats(id),
        )?;

        Ok(ContractorDetail {
            contractor,
            teams,
            documents,
            project_stats,
        })
    }

    async fn document_counts(&self, id: Uuid) -> Result<Vec<DocumentCount>, DbError> {
        let rows = sqlx::query_as::<_, DocumentCount>(
            r#"
            SELECT document_type, COUNT(*) AS count
            FROM contractor_documents
            WHERE contractor_id = $1
            GROUP BY document_type
            ORDER BY document_type
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn project_stats(&self, id: Uuid) -> Result<ProjectStats, DbError> {
        let stats = sqlx::query_as::<_, ProjectStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'active') AS active_projects,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed_projects,
                   COUNT(*) AS total_projects
            FROM project_assignments
            WHERE contractor_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// Apply only the fields that are set. Returns `InvalidInput` when
    /// nothing is set.
    pub async fn update(&self, id: Uuid, c: &ContractorChanges) -> Result<Contractor, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE contractors SET ");
        if c.push_sets(&mut qb) == 0 {
            return Err(DbError::InvalidInput("No fields to update".into()));
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING *");

        qb.build_query_as::<Contractor>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(msg) if msg.contains("email") => {
                    DbError::Conflict(DUPLICATE_EMAIL.into())
                }
                other => other.with_conflict_message(DUPLICATE_CONTRACTOR),
            })?
            .ok_or_else(|| DbError::not_found("contractor", id))
    }

    /// Mark inactive, keeping history.
    pub async fn deactivate(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE contractors SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("contractor", id))?;
        Ok(())
    }

    /// Permanently delete; dependent rows cascade.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM contractors WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("contractor", id))?;
        Ok(())
    }

    pub async fn teams(&self, contractor_id: Uuid) -> Result<Vec<ContractorTeam>, DbError> {
        let (_, teams) = tokio::try_join!(self.get(contractor_id), self.teams_of(contractor_id))?;
        Ok(teams)
    }

    async fn teams_of(&self, contractor_id: Uuid) -> Result<Vec<ContractorTeam>, DbError> {
        let rows = sqlx::query_as::<_, ContractorTeam>(
            r#"
            SELECT t.*, COUNT(m.id) FILTER (WHERE m.is_active) AS member_count
            FROM contractor_teams t
            LEFT JOIN team_members m ON m.team_id = t.id
            WHERE t.contractor_id = $1
            GROUP BY t.id
            ORDER BY t.team_name
            "#,
        )
        .bind(contractor_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_team(&self, contractor_id: Uuid, t: &NewTeam) -> Result<ContractorTeam, DbError> {
        sqlx::query_as::<_, ContractorTeam>(
            r#"
            INSERT INTO contractor_teams (
                contractor_id, team_name, team_type, specialization, max_capacity,
                availability, base_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(contractor_id)
        .bind(&t.team_name)
        .bind(&t.team_type)
        .bind(&t.specialization)
        .bind(t.max_capacity)
        .bind(&t.availability)
        .bind(&t.base_location)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::not_found("contractor", contractor_id),
            other => other,
        })
    }

    pub async fn documents(&self, contractor_id: Uuid) -> Result<Vec<ContractorDocument>, DbError> {
        self.get(contractor_id).await?;
        let rows = sqlx::query_as::<_, ContractorDocument>(
            r#"
            SELECT * FROM contractor_documents
            WHERE contractor_id = $1
            ORDER BY document_type, created_at DESC
            "#,
        )
        .bind(contractor_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_document(
        &self,
        contractor_id: Uuid,
        d: &NewDocument,
    ) -> Result<ContractorDocument, DbError> {
        sqlx::query_as::<_, ContractorDocument>(
            r#"
            INSERT INTO contractor_documents (
                contractor_id, document_type, document_name, document_number, file_url,
                issue_date, expiry_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(contractor_id)
        .bind(&d.document_type)
        .bind(&d.document_name)
        .bind(&d.document_number)
        .bind(&d.file_url)
        .bind(d.issue_date)
        .bind(d.expiry_date)
        .bind(&d.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::not_found("contractor", contractor_id),
            other => other,
        })
    }

    /// Approve, reject or reset a document. Approval stamps the reviewer.
    pub async fn review_document(
        &self,
        contractor_id: Uuid,
        document_id: Uuid,
        r: &DocumentReview,
    ) -> Result<ContractorDocument, DbError> {
        sqlx::query_as::<_, ContractorDocument>(
            r#"
            UPDATE contractor_documents SET
                status = $3,
                verified_by = CASE WHEN $3 = 'approved' THEN $4 ELSE verified_by END,
                verified_at = CASE WHEN $3 = 'approved' THEN NOW() ELSE verified_at END,
                rejection_reason = CASE WHEN $3 = 'rejected' THEN $5 ELSE NULL END,
                updated_at = NOW()
            WHERE id = $2 AND contractor_id = $1
            RETURNING *
            "#,
        )
        .bind(contractor_id)
        .bind(document_id)
        .bind(&r.status)
        .bind(&r.verified_by)
        .bind(&r.rejection_reason)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("document", document_id))
    }

    pub async fn add_incident(
        &self,
        contractor_id: Uuid,
        i: &NewIncident,
    ) -> Result<SafetyIncident, DbError> {
        sqlx::query_as::<_, SafetyIncident>(
            r#"
            INSERT INTO contractor_safety_incidents (
                contractor_id, project_id, incident_date, severity, description, reported_by
            )
            VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(contractor_id)
        .bind(i.project_id)
        .bind(i.incident_date)
        .bind(&i.severity)
        .bind(&i.description)
        .bind(&i.reported_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => {
                DbError::InvalidInput("contractor or project does not exist".into())
            }
            other => other,
        })
    }

    pub async fn assignments(&self, contractor_id: Uuid) -> Result<Vec<ProjectAssignment>, DbError> {
        self.get(contractor_id).await?;
        let rows = sqlx::query_as::<_, ProjectAssignment>(
            r#"
            SELECT pa.*, p.name AS project_name
            FROM project_assignments pa
            JOIN projects p ON p.id = pa.project_id
            WHERE pa.contractor_id = $1
            ORDER BY pa.start_date DESC
            "#,
        )
        .bind(contractor_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_assignment(
        &self,
        contractor_id: Uuid,
        a: &NewAssignment,
    ) -> Result<ProjectAssignment, DbError> {
        sqlx::query_as::<_, ProjectAssignment>(
            r#"
            INSERT INTO project_assignments (
                contractor_id, project_id, team_id, scope, start_date, end_date,
                contract_value, status, payment_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(contractor_id)
        .bind(a.project_id)
        .bind(a.team_id)
        .bind(&a.scope)
        .bind(a.start_date)
        .bind(a.end_date)
        .bind(a.contract_value)
        .bind(&a.status)
        .bind(&a.payment_status)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => {
                DbError::InvalidInput("contractor, project or team does not exist".into())
            }
            other => other,
        })
    }

    /// Project, document and team metrics plus the 20 latest RAG changes.
    pub async fn analytics(&self, id: Uuid) -> Result<ContractorAnalytics, DbError> {
        let rag = super::RagRepo::new(self.pool);
        let (contractor, project_metrics, document_metrics, team_metrics, rag_history) =
            tokio::try_join!(
                self.get(id),
                self.assignment_metrics(id),
                self.document_metrics(id),
                self.team_metrics(id),
                rag.history(id, 20),
            )?;

        Ok(ContractorAnalytics {
            contractor_id: contractor.id,
            company_name: contractor.company_name,
            project_metrics,
            document_metrics,
            team_metrics,
            rag_history,
        })
    }

    async fn assignment_metrics(&self, id: Uuid) -> Result<AssignmentMetrics, DbError> {
        let m = sqlx::query_as::<_, AssignmentMetrics>(
            r#"
            SELECT COUNT(*) AS total_projects,
                   COUNT(*) FILTER (WHERE status = 'active') AS active_projects,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed_projects,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_projects,
                   AVG(progress_percentage)::float8 AS avg_progress,
                   AVG(CASE WHEN status = 'completed' AND actual_end_date IS NOT NULL
                            THEN (actual_end_date - start_date)::float8
                                 / NULLIF(end_date - start_date, 0)
                       END)::float8 AS avg_schedule_performance,
                   COALESCE(SUM(contract_value), 0) AS total_contract_value
            FROM project_assignments
            WHERE contractor_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(m)
    }

    async fn document_metrics(&self, id: Uuid) -> Result<DocumentMetrics, DbError> {
        let m = sqlx::query_as::<_, DocumentMetrics>(
            r#"
            SELECT COUNT(*) AS total_documents,
                   COUNT(*) FILTER (WHERE status = 'approved') AS approved_documents,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending_documents,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected_documents,
                   COUNT(*) FILTER (WHERE expiry_date < CURRENT_DATE) AS expired_documents,
                   COUNT(DISTINCT document_type) AS document_types
            FROM contractor_documents
            WHERE contractor_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(m)
    }

    async fn team_metrics(&self, id: Uuid) -> Result<TeamMetrics, DbError> {
        let m = sqlx::query_as::<_, TeamMetrics>(
            r#"
            SELECT COUNT(DISTINCT t.id) AS total_teams,
                   COUNT(DISTINCT m.id) AS total_team_members,
                   COALESCE(ARRAY_AGG(DISTINCT t.team_name)
                            FILTER (WHERE t.team_name IS NOT NULL), '{}') AS team_names
            FROM contractor_teams t
            LEFT JOIN team_members m ON m.team_id = t.id AND m.is_active
            WHERE t.contractor_id = $1 AND t.is_active
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_changes_push_nothing() {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE contractors SET ");
        assert_eq!(ContractorChanges::default().push_sets(&mut qb), 0);
        assert_eq!(qb.sql(), "UPDATE contractors SET ");
    }

    #[test]
    fn only_set_fields_are_updated() {
        let changes = ContractorChanges {
            company_name: Some("Velocity Fibre".into()),
            is_active: Some(true),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE contractors SET ");
        assert_eq!(changes.push_sets(&mut qb), 2);
        assert_eq!(
            qb.sql(),
            "UPDATE contractors SET company_name = $1, is_active = $2, updated_at = NOW()"
        );
    }
}
