//! Staff repository, including per-period performance records

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_STAFF: &str = "A staff member with this employee ID or email already exists";

/// Staff record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Staff {
    pub id: Uuid,
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub staff_type: String,
    pub status: String,
    pub salary: Option<Decimal>,
    pub join_date: Option<NaiveDate>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub reports_to: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StaffPerformance {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub productivity: Option<f64>,
    pub quality_score: Option<f64>,
    pub safety_score: Option<f64>,
    pub hours_worked: f64,
    pub tasks_completed: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewStaff {
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub staff_type: String,
    pub status: String,
    pub salary: Option<Decimal>,
    pub join_date: Option<NaiveDate>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub reports_to: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaffChanges {
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub staff_type: Option<String>,
    pub status: Option<String>,
    pub salary: Option<Decimal>,
    pub join_date: Option<NaiveDate>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub reports_to: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaffFilter {
    pub search: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub staff_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPerformance {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub productivity: Option<f64>,
    pub quality_score: Option<f64>,
    pub safety_score: Option<f64>,
    pub hours_worked: f64,
    pub tasks_completed: i32,
    pub notes: Option<String>,
}

/// Staff repository
pub struct StaffRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &StaffFilter,
        page: Pagination,
    ) -> Result<Paginated<Staff>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM staff
            WHERE ($1::text IS NULL
                   OR name ILIKE $1 OR email ILIKE $1 OR employee_id ILIKE $1)
              AND ($2::text IS NULL OR department = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR type = $4)
            ORDER BY name
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.department.as_deref())
        .bind(filter.status.as_deref())
        .bind(filter.staff_type.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, s: &NewStaff) -> Result<Staff, DbError> {
        sqlx::query_as::<_, Staff>(
            r#"
            INSERT INTO staff (
                employee_id, name, email, phone, department, position, type, status,
                salary, join_date, skills, certifications, reports_to, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(&s.employee_id)
        .bind(&s.name)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.department)
        .bind(&s.position)
        .bind(&s.staff_type)
        .bind(&s.status)
        .bind(s.salary)
        .bind(s.join_date)
        .bind(&s.skills)
        .bind(&s.certifications)
        .bind(s.reports_to)
        .bind(&s.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_STAFF))
    }

    pub async fn get(&self, id: Uuid) -> Result<Staff, DbError> {
        sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("staff", id))
    }

    pub async fn update(&self, id: Uuid, s: &StaffChanges) -> Result<Staff, DbError> {
        sqlx::query_as::<_, Staff>(
            r#"
            UPDATE staff SET
                employee_id = COALESCE($2, employee_id),
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                department = COALESCE($6, department),
                position = COALESCE($7, position),
                type = COALESCE($8, type),
                status = COALESCE($9, status),
                salary = COALESCE($10, salary),
                join_date = COALESCE($11, join_date),
                skills = COALESCE($12, skills),
                certifications = COALESCE($13, certifications),
                reports_to = COALESCE($14, reports_to),
                notes = COALESCE($15, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&s.employee_id)
        .bind(&s.name)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.department)
        .bind(&s.position)
        .bind(&s.staff_type)
        .bind(&s.status)
        .bind(s.salary)
        .bind(s.join_date)
        .bind(&s.skills)
        .bind(&s.certifications)
        .bind(s.reports_to)
        .bind(&s.notes)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_STAFF))?
        .ok_or_else(|| DbError::not_found("staff", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM staff WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("staff", id))?;
        Ok(())
    }

    /// Performance records, newest period first.
    pub async fn performance(&self, staff_id: Uuid) -> Result<Vec<StaffPerformance>, DbError> {
        // 404 rather than an empty list for unknown staff
        self.get(staff_id).await?;

        let rows = sqlx::query_as::<_, StaffPerformance>(
            r#"
            SELECT * FROM staff_performance
            WHERE staff_id = $1
            ORDER BY period_start DESC
            "#,
        )
        .bind(staff_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_performance(
        &self,
        staff_id: Uuid,
        p: &NewPerformance,
    ) -> Result<StaffPerformance, DbError> {
        sqlx::query_as::<_, StaffPerformance>(
            r#"
            INSERT INTO staff_performance (
                staff_id, period_start, period_end, productivity, quality_score,
                safety_score, hours_worked, tasks_completed, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(staff_id)
        .bind(p.period_start)
        .bind(p.period_end)
        .bind(p.productivity)
        .bind(p.quality_score)
        .bind(p.safety_score)
        .bind(p.hours_worked)
        .bind(p.tasks_completed)
        .bind(&p.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            // the only foreign key on the table
            DbError::Conflict(_) => DbError::not_found("staff", staff_id),
            other => other,
        })
    }
}
