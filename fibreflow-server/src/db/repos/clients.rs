//! Client repository
//!
//! - create: client code defaults to `CLI-<unix millis>`
//! - get_detail: client plus project rollup, fetched concurrently
//! - delete: refused while projects still reference the client

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

/// Client record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub client_code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub industry: Option<String>,
    pub client_type: Option<String>,
    pub status: String,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project row shown on the client detail page
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClientProject {
    pub id: Uuid,
    pub project_code: String,
    pub name: String,
    pub status: String,
    pub progress: f64,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub project_count: i64,
    pub active_projects: i64,
    pub total_budget: Decimal,
    pub projects: Vec<ClientProject>,
}

/// Validated insert
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub client_code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub industry: Option<String>,
    pub client_type: Option<String>,
    pub status: String,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ClientChanges {
    pub client_code: Option<String>,
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub industry: Option<String>,
    pub client_type: Option<String>,
    pub status: Option<String>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// Already a LIKE pattern
    pub search: Option<String>,
    pub status: Option<String>,
}

/// Default client code for inserts without one
pub fn generated_client_code(now: DateTime<Utc>) -> String {
    format!("CLI-{}", now.timestamp_millis())
}

/// Client repository
pub struct ClientRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ClientFilter,
        page: Pagination,
    ) -> Result<Paginated<Client>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM clients
            WHERE ($1::text IS NULL
                   OR name ILIKE $1 OR contact_person ILIKE $1 OR email ILIKE $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.status.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, c: &NewClient) -> Result<Client, DbError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                client_code, name, contact_person, email, phone, address, city,
                province, postal_code, country, industry, client_type, status,
                payment_terms, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(&c.client_code)
        .bind(&c.name)
        .bind(&c.contact_person)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.province)
        .bind(&c.postal_code)
        .bind(&c.country)
        .bind(&c.industry)
        .bind(&c.client_type)
        .bind(&c.status)
        .bind(&c.payment_terms)
        .bind(&c.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            DbError::from(e).with_conflict_message("A client with this client code already exists")
        })?;

        Ok(client)
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("client", id))
    }

    /// Client with project rollup and its projects.
    pub async fn get_detail(&self, id: Uuid) -> Result<ClientDetail, DbError> {
        let (client, (project_count, active_projects, total_budget), projects) =
            tokio::try_join!(self.get(id), self.project_rollup(id), self.projects(id))?;

        Ok(ClientDetail {
            client,
            project_count,
            active_projects,
            total_budget,
            projects,
        })
    }

    async fn project_rollup(&self, id: Uuid) -> Result<(i64, i64, Decimal), DbError> {
        let row = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'ACTIVE'),
                   COALESCE(SUM(budget), 0)
            FROM projects
            WHERE client_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    async fn projects(&self, id: Uuid) -> Result<Vec<ClientProject>, DbError> {
        let rows = sqlx::query_as::<_, ClientProject>(
            r#"
            SELECT id, project_code, name, status, progress, budget, start_date, end_date
            FROM projects
            WHERE client_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: Uuid, c: &ClientChanges) -> Result<Client, DbError> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                client_code = COALESCE($2, client_code),
                name = COALESCE($3, name),
                contact_person = COALESCE($4, contact_person),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                address = COALESCE($7, address),
                city = COALESCE($8, city),
                province = COALESCE($9, province),
                postal_code = COALESCE($10, postal_code),
                country = COALESCE($11, country),
                industry = COALESCE($12, industry),
                client_type = COALESCE($13, client_type),
                status = COALESCE($14, status),
                payment_terms = COALESCE($15, payment_terms),
                notes = COALESCE($16, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&c.client_code)
        .bind(&c.name)
        .bind(&c.contact_person)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.province)
        .bind(&c.postal_code)
        .bind(&c.country)
        .bind(&c.industry)
        .bind(&c.client_type)
        .bind(&c.status)
        .bind(&c.payment_terms)
        .bind(&c.notes)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            DbError::from(e).with_conflict_message("A client with this client code already exists")
        })?
        .ok_or_else(|| DbError::not_found("client", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM clients WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                DbError::from(e).with_conflict_message("Cannot delete client with existing projects")
            })?
            .ok_or_else(|| DbError::not_found("client", id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn client_code_uses_millis() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(generated_client_code(now), "CLI-1700000000123");
    }
}
