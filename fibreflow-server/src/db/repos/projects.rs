//! Project repository and project staff assignments

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_PROJECT: &str = "A project with this project code already exists";

/// Project record; `client_name` is filled by list and get
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    #[sqlx(default)]
    pub client_name: Option<String>,
    pub project_manager_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub project_type: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: f64,
    pub budget: Option<Decimal>,
    pub actual_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff member assigned to a project
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectStaff {
    pub staff_id: Uuid,
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub position: Option<String>,
    pub role: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub project_code: String,
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_manager_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub project_type: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: f64,
    pub budget: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub project_code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_manager_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project_type: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: Option<f64>,
    pub budget: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Any of these statuses
    pub statuses: Option<Vec<String>>,
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
}

/// Project repository
pub struct ProjectRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> Result<Paginated<Project>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT p.*, c.name AS client_name, COUNT(*) OVER() AS total
            FROM projects p
            LEFT JOIN clients c ON c.id = p.client_id
            WHERE ($1::text[] IS NULL OR p.status = ANY($1))
              AND ($2::text IS NULL OR p.name ILIKE $2 OR p.project_code ILIKE $2)
              AND ($3::uuid IS NULL OR p.client_id = $3)
            ORDER BY p.created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.statuses.as_deref())
        .bind(filter.search.as_deref())
        .bind(filter.client_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, p: &NewProject) -> Result<Project, DbError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO projects (
                project_code, name, description, client_id, project_manager_id, status,
                priority, project_type, location, start_date, end_date, progress,
                budget, actual_cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, COALESCE($14, 0))
            RETURNING id
            "#,
        )
        .bind(&p.project_code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.client_id)
        .bind(p.project_manager_id)
        .bind(&p.status)
        .bind(&p.priority)
        .bind(&p.project_type)
        .bind(&p.location)
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(p.progress)
        .bind(p.budget)
        .bind(p.actual_cost)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(msg) if msg.contains("project_code") => {
                DbError::Conflict(DUPLICATE_PROJECT.into())
            }
            DbError::Conflict(_) => {
                DbError::InvalidInput("client_id or project_manager_id does not exist".into())
            }
            other => other,
        })?;

        self.get(row.0).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Project, DbError> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.*, c.name AS client_name
            FROM projects p
            LEFT JOIN clients c ON c.id = p.client_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("project", id))
    }

    /// Fail with NotFound unless the project exists.
    pub async fn ensure_exists(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("SELECT 1 FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("project", id))?;
        Ok(())
    }

    pub async fn update(&self, id: Uuid, p: &ProjectChanges) -> Result<Project, DbError> {
        sqlx::query(
            r#"
            UPDATE projects SET
                project_code = COALESCE($2, project_code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                client_id = COALESCE($5, client_id),
                project_manager_id = COALESCE($6, project_manager_id),
                status = COALESCE($7, status),
                priority = COALESCE($8, priority),
                project_type = COALESCE($9, project_type),
                location = COALESCE($10, location),
                start_date = COALESCE($11, start_date),
                end_date = COALESCE($12, end_date),
                progress = COALESCE($13, progress),
                budget = COALESCE($14, budget),
                actual_cost = COALESCE($15, actual_cost),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&p.project_code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.client_id)
        .bind(p.project_manager_id)
        .bind(&p.status)
        .bind(&p.priority)
        .bind(&p.project_type)
        .bind(&p.location)
        .bind(p.start_date)
        .bind(p.end_date)
        .bind(p.progress)
        .bind(p.budget)
        .bind(p.actual_cost)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_PROJECT))?
        .ok_or_else(|| DbError::not_found("project", id))?;

        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM projects WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("project", id))?;
        Ok(())
    }

    pub async fn staff(&self, project_id: Uuid) -> Result<Vec<ProjectStaff>, DbError> {
        self.ensure_exists(project_id).await?;
        let rows = sqlx::query_as::<_, ProjectStaff>(
            r#"
            SELECT s.id AS staff_id, s.employee_id, s.name, s.email, s.position,
                   ps.role, ps.assigned_at
            FROM project_staff ps
            JOIN staff s ON s.id = ps.staff_id
            WHERE ps.project_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Assign staff; re-assigning updates the role.
    pub async fn assign_staff(
        &self,
        project_id: Uuid,
        staff_id: Uuid,
        role: Option<&str>,
    ) -> Result<ProjectStaff, DbError> {
        sqlx::query(
            r#"
            INSERT INTO project_staff (project_id, staff_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, staff_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(project_id)
        .bind(staff_id)
        .bind(role)
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(_) => DbError::InvalidInput("project or staff member does not exist".into()),
            other => other,
        })?;

        sqlx::query_as::<_, ProjectStaff>(
            r#"
            SELECT s.id AS staff_id, s.employee_id, s.name, s.email, s.position,
                   ps.role, ps.assigned_at
            FROM project_staff ps
            JOIN staff s ON s.id = ps.staff_id
            WHERE ps.project_id = $1 AND ps.staff_id = $2
            "#,
        )
        .bind(project_id)
        .bind(staff_id)
        .fetch_one(self.pool)
        .await
        .map_err(DbError::from)
    }

    pub async fn unassign_staff(&self, project_id: Uuid, staff_id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            "DELETE FROM project_staff WHERE project_id = $1 AND staff_id = $2 RETURNING staff_id",
        )
        .bind(project_id)
        .bind(staff_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("project staff assignment", staff_id))?;
        Ok(())
    }
}
