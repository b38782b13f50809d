//! Global search across the main entity tables

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::fields::like_pattern;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SearchHit {
    pub kind: String,
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub total: usize,
    pub results: Vec<SearchHit>,
}

pub struct SearchRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SearchRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Match `query` against clients, projects, staff and contractors,
    /// at most `limit` hits per kind, then log the search.
    pub async fn search(&self, query: &str, limit: u32) -> Result<SearchResults, DbError> {
        let pattern = like_pattern(query);
        let results = sqlx::query_as::<_, SearchHit>(
            r#"
            (SELECT 'client' AS kind, id, name AS title, contact_person AS subtitle, status
               FROM clients
              WHERE name ILIKE $1 OR client_code ILIKE $1 OR contact_person ILIKE $1 OR email ILIKE $1
              ORDER BY name LIMIT $2)
            UNION ALL
            (SELECT 'project', id, name, project_code, status
               FROM projects
              WHERE name ILIKE $1 OR project_code ILIKE $1 OR location ILIKE $1
              ORDER BY name LIMIT $2)
            UNION ALL
            (SELECT 'staff', id, name, position, status
               FROM staff
              WHERE name ILIKE $1 OR employee_id ILIKE $1 OR email ILIKE $1
              ORDER BY name LIMIT $2)
            UNION ALL
            (SELECT 'contractor', id, company_name, contact_person, status
               FROM contractors
              WHERE company_name ILIKE $1 OR registration_number ILIKE $1
                 OR contact_person ILIKE $1 OR email ILIKE $1
              ORDER BY company_name LIMIT $2)
            "#,
        )
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        self.log(query, results.len()).await;

        Ok(SearchResults {
            query: query.to_owned(),
            total: results.len(),
            results,
        })
    }

    async fn log(&self, query: &str, result_count: usize) {
        let logged = sqlx::query("INSERT INTO search_history (query, result_count) VALUES ($1, $2)")
            .bind(query)
            .bind(result_count as i64)
            .execute(self.pool)
            .await;
        if let Err(e) = logged {
            tracing::warn!(error = %e, "failed to log search");
        }
    }
}
