//! Cable drum inventory and usage

use chrono::{DateTime, Utc};
use fibreflow_core::stock::{deduct_drum_length, drum_status_after_use};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_DRUM: &str = "A drum with this drum number already exists for the project";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CableDrum {
    pub id: Uuid,
    pub project_id: Uuid,
    pub drum_number: String,
    pub cable_type: String,
    pub cable_size: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub original_length: Decimal,
    pub remaining_length: Decimal,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DrumUsage {
    pub id: Uuid,
    pub drum_id: Uuid,
    pub length_used: Decimal,
    pub used_for: Option<String>,
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageOutcome {
    pub drum: CableDrum,
    pub usage: DrumUsage,
}

#[derive(Debug, Clone, Default)]
pub struct NewDrum {
    pub drum_number: String,
    pub cable_type: String,
    pub cable_size: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub original_length: Decimal,
    pub remaining_length: Option<Decimal>,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DrumChanges {
    pub cable_type: Option<String>,
    pub cable_size: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DrumFilter {
    pub status: Option<String>,
    pub cable_type: Option<String>,
}

pub struct CableDrumRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CableDrumRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        filter: &DrumFilter,
        page: Pagination,
    ) -> Result<Paginated<CableDrum>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM cable_drums
            WHERE project_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR cable_type = $3)
            ORDER BY drum_number
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(project_id)
        .bind(filter.status.as_deref())
        .bind(filter.cable_type.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, project_id: Uuid, d: &NewDrum) -> Result<CableDrum, DbError> {
        sqlx::query_as::<_, CableDrum>(
            r#"
            INSERT INTO cable_drums (
                project_id, drum_number, cable_type, cable_size, supplier_id,
                original_length, remaining_length, status, location, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, $6), $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&d.drum_number)
        .bind(&d.cable_type)
        .bind(&d.cable_size)
        .bind(d.supplier_id)
        .bind(d.original_length)
        .bind(d.remaining_length)
        .bind(&d.status)
        .bind(&d.location)
        .bind(&d.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(msg) if msg.contains("drum_number") => {
                DbError::Conflict(DUPLICATE_DRUM.into())
            }
            DbError::Conflict(_) => {
                DbError::InvalidInput("project or supplier does not exist".into())
            }
            other => other,
        })
    }

    pub async fn get(&self, project_id: Uuid, id: Uuid) -> Result<CableDrum, DbError> {
        sqlx::query_as::<_, CableDrum>(
            "SELECT * FROM cable_drums WHERE id = $1 AND project_id = $2",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("cable drum", id))
    }

    pub async fn update(
        &self,
        project_id: Uuid,
        id: Uuid,
        c: &DrumChanges,
    ) -> Result<CableDrum, DbError> {
        sqlx::query_as::<_, CableDrum>(
            r#"
            UPDATE cable_drums SET
                cable_type = COALESCE($3, cable_type),
                cable_size = COALESCE($4, cable_size),
                supplier_id = COALESCE($5, supplier_id),
                status = COALESCE($6, status),
                location = COALESCE($7, location),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1 AND project_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&c.cable_type)
        .bind(&c.cable_size)
        .bind(c.supplier_id)
        .bind(&c.status)
        .bind(&c.location)
        .bind(&c.notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("cable drum", id))
    }

    pub async fn delete(&self, project_id: Uuid, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM cable_drums WHERE id = $1 AND project_id = $2 RETURNING id")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("cable drum", id))?;
        Ok(())
    }

    /// Cut `length` metres from the drum and log the usage.
    pub async fn record_usage(
        &self,
        project_id: Uuid,
        id: Uuid,
        length: Decimal,
        used_for: Option<&str>,
        used_by: Option<&str>,
    ) -> Result<UsageOutcome, DbError> {
        let mut tx = self.pool.begin().await?;
        let drum = sqlx::query_as::<_, CableDrum>(
            "SELECT * FROM cable_drums WHERE id = $1 AND project_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("cable drum", id))?;

        let remaining = deduct_drum_length(drum.remaining_length, length)
            .map_err(|e| DbError::InvalidInput(e.to_string()))?;
        let status = drum_status_after_use(drum.original_length, remaining);

        let drum = sqlx::query_as::<_, CableDrum>(
            r#"
            UPDATE cable_drums
            SET remaining_length = $2, status = $3, last_used_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(remaining)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        let usage = sqlx::query_as::<_, DrumUsage>(
            r#"
            INSERT INTO cable_drum_usage (drum_id, length_used, used_for, used_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(length)
        .bind(used_for)
        .bind(used_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(drum_id = %id, used = %length, remaining = %remaining, "drum usage recorded");
        Ok(UsageOutcome { drum, usage })
    }
}
