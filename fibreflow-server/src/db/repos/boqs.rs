//! Bills of quantities, their line items and mapping exceptions
//!
//! - import: header and items in one transaction; `(project, version)` is unique
//! - map: match items to the project's stock positions by item code,
//!   raising a `no_match` exception for every item left unmapped

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_VERSION: &str = "A BOQ with this version already exists for the project";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Boq {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub mapping_status: String,
    pub mapping_confidence: Option<f64>,
    pub uploaded_by: String,
    pub file_name: Option<String>,
    pub item_count: i32,
    pub mapped_items: i32,
    pub unmapped_items: i32,
    pub exceptions_count: i32,
    pub total_estimated_value: Option<Decimal>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BoqItem {
    pub id: Uuid,
    pub boq_id: Uuid,
    pub line_number: i32,
    pub item_code: Option<String>,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub mapped_stock_id: Option<Uuid>,
    pub mapping_confidence: Option<f64>,
    pub is_mapped: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BoqException {
    pub id: Uuid,
    pub boq_id: Uuid,
    pub boq_item_id: Option<Uuid>,
    pub exception_type: String,
    pub severity: String,
    pub description: String,
    pub resolution_status: String,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingOutcome {
    pub boq: Boq,
    pub mapped: i64,
    pub unmapped: i64,
    pub exceptions_created: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewBoq {
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub uploaded_by: Option<String>,
    pub file_name: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBoqItem {
    pub line_number: Option<i32>,
    pub item_code: Option<String>,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
}

impl NewBoqItem {
    /// Stated amount, else quantity × rate.
    pub fn line_amount(&self) -> Option<Decimal> {
        self.amount.or_else(|| self.rate.map(|r| r * self.quantity))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoqChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExceptionResolution {
    pub resolution_status: String,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

/// Share of mapped items as a percentage, `None` for an empty BOQ.
pub fn mapping_confidence(mapped: i64, total: i64) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    Some((mapped as f64 / total as f64 * 10000.0).round() / 100.0)
}

fn mapping_status(mapped: i64, total: i64) -> &'static str {
    match (mapped, total) {
        (_, 0) => "pending",
        (m, t) if m >= t => "completed",
        (0, _) => "failed",
        _ => "partial",
    }
}

pub struct BoqRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BoqRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        status: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<Boq>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM boqs
            WHERE project_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(project_id)
        .bind(status)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, project_id: Uuid, b: &NewBoq) -> Result<Boq, DbError> {
        self.import(project_id, b, &[]).await
    }

    /// Insert a BOQ header with its items.
    pub async fn import(
        &self,
        project_id: Uuid,
        b: &NewBoq,
        items: &[NewBoqItem],
    ) -> Result<Boq, DbError> {
        let total_value = items
            .iter()
            .filter_map(NewBoqItem::line_amount)
            .fold(None, |acc: Option<Decimal>, v| Some(acc.unwrap_or_default() + v));

        let mut tx = self.pool.begin().await?;
        let boq = sqlx::query_as::<_, Boq>(
            r#"
            INSERT INTO boqs (
                project_id, version, title, description, status, uploaded_by, file_name,
                item_count, unmapped_items, total_estimated_value, currency
            )
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'system'), $7, $8, $8, $9, COALESCE($10, 'ZAR'))
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&b.version)
        .bind(&b.title)
        .bind(&b.description)
        .bind(&b.status)
        .bind(&b.uploaded_by)
        .bind(&b.file_name)
        .bind(items.len() as i32)
        .bind(total_value)
        .bind(&b.currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(msg) if msg.contains("version") => {
                DbError::Conflict(DUPLICATE_VERSION.into())
            }
            DbError::Conflict(_) => DbError::not_found("project", project_id),
            other => other,
        })?;

        for (idx, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO boq_items (
                    boq_id, line_number, item_code, description, unit, quantity, rate, amount, category
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(boq.id)
            .bind(item.line_number.unwrap_or(idx as i32 + 1))
            .bind(&item.item_code)
            .bind(&item.description)
            .bind(&item.unit)
            .bind(item.quantity)
            .bind(item.rate)
            .bind(item.line_amount())
            .bind(&item.category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        if !items.is_empty() {
            tracing::info!(boq_id = %boq.id, %project_id, items = items.len(), "BOQ imported");
        }
        Ok(boq)
    }

    pub async fn get(&self, project_id: Uuid, id: Uuid) -> Result<Boq, DbError> {
        sqlx::query_as::<_, Boq>("SELECT * FROM boqs WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("boq", id))
    }

    pub async fn update(&self, project_id: Uuid, id: Uuid, c: &BoqChanges) -> Result<Boq, DbError> {
        sqlx::query_as::<_, Boq>(
            r#"
            UPDATE boqs SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                currency = COALESCE($6, currency),
                updated_at = NOW()
            WHERE id = $1 AND project_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&c.title)
        .bind(&c.description)
        .bind(&c.status)
        .bind(&c.currency)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("boq", id))
    }

    pub async fn delete(&self, project_id: Uuid, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM boqs WHERE id = $1 AND project_id = $2 RETURNING id")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("boq", id))?;
        Ok(())
    }

    pub async fn items(&self, project_id: Uuid, id: Uuid) -> Result<Vec<BoqItem>, DbError> {
        self.get(project_id, id).await?;
        let rows = sqlx::query_as::<_, BoqItem>(
            "SELECT * FROM boq_items WHERE boq_id = $1 ORDER BY line_number",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn exceptions(
        &self,
        project_id: Uuid,
        id: Uuid,
        resolution_status: Option<&str>,
    ) -> Result<Vec<BoqException>, DbError> {
        self.get(project_id, id).await?;
        let rows = sqlx::query_as::<_, BoqException>(
            r#"
            SELECT * FROM boq_exceptions
            WHERE boq_id = $1 AND ($2::text IS NULL OR resolution_status = $2)
            ORDER BY created_at
            "#,
        )
        .bind(id)
        .bind(resolution_status)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Match items to stock by item code and raise exceptions for the rest.
    ///
    /// Re-running replaces the pending `no_match` exceptions from earlier runs.
    pub async fn map_to_stock(&self, project_id: Uuid, id: Uuid) -> Result<MappingOutcome, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT id FROM boqs WHERE id = $1 AND project_id = $2 FOR UPDATE")
            .bind(id)
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("boq", id))?;

        sqlx::query(
            "DELETE FROM boq_exceptions WHERE boq_id = $1 AND exception_type = 'no_match' AND resolution_status = 'pending'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE boq_items bi
            SET mapped_stock_id = sp.id, mapping_confidence = 1.0, is_mapped = TRUE
            FROM stock_positions sp
            WHERE bi.boq_id = $1
              AND sp.project_id = $2
              AND bi.item_code IS NOT NULL
              AND LOWER(sp.item_code) = LOWER(bi.item_code)
            "#,
        )
        .bind(id)
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

        let created = sqlx::query(
            r#"
            INSERT INTO boq_exceptions (boq_id, boq_item_id, exception_type, severity, description)
            SELECT boq_id, id, 'no_match',
                   CASE WHEN item_code IS NULL THEN 'high' ELSE 'medium' END,
                   CASE WHEN item_code IS NULL
                        THEN 'Line ' || line_number || ' has no item code'
                        ELSE 'No stock item matches item code ' || item_code
                   END
            FROM boq_items
            WHERE boq_id = $1 AND NOT is_mapped
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected() as i64;

        let (mapped, total): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE is_mapped), COUNT(*) FROM boq_items WHERE boq_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let boq = sqlx::query_as::<_, Boq>(
            r#"
            UPDATE boqs SET
                mapped_items = $2,
                unmapped_items = $3 - $2,
                mapping_confidence = $4,
                mapping_status = $5,
                exceptions_count = (
                    SELECT COUNT(*) FROM boq_exceptions
                    WHERE boq_id = $1 AND resolution_status = 'pending'
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(mapped as i32)
        .bind(total as i32)
        .bind(mapping_confidence(mapped, total))
        .bind(mapping_status(mapped, total))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(boq_id = %id, mapped, unmapped = total - mapped, "BOQ mapped to stock");

        Ok(MappingOutcome {
            boq,
            mapped,
            unmapped: total - mapped,
            exceptions_created: created,
        })
    }

    pub async fn resolve_exception(
        &self,
        project_id: Uuid,
        id: Uuid,
        exception_id: Uuid,
        r: &ExceptionResolution,
    ) -> Result<BoqException, DbError> {
        self.get(project_id, id).await?;
        let mut tx = self.pool.begin().await?;
        let exception = sqlx::query_as::<_, BoqException>(
            r#"
            UPDATE boq_exceptions SET
                resolution_status = $3,
                resolved_by = $4,
                resolution_notes = $5,
                resolved_at = CASE WHEN $3 = 'pending' THEN NULL ELSE NOW() END,
                updated_at = NOW()
            WHERE id = $1 AND boq_id = $2
            RETURNING *
            "#,
        )
        .bind(exception_id)
        .bind(id)
        .bind(&r.resolution_status)
        .bind(&r.resolved_by)
        .bind(&r.resolution_notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("boq exception", exception_id))?;

        sqlx::query(
            r#"
            UPDATE boqs SET
                exceptions_count = (
                    SELECT COUNT(*) FROM boq_exceptions
                    WHERE boq_id = $1 AND resolution_status = 'pending'
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_a_rounded_percentage() {
        assert_eq!(mapping_confidence(0, 0), None);
        assert_eq!(mapping_confidence(2, 3), Some(66.67));
        assert_eq!(mapping_confidence(4, 4), Some(100.0));
    }

    #[test]
    fn status_reflects_coverage() {
        assert_eq!(mapping_status(0, 0), "pending");
        assert_eq!(mapping_status(0, 5), "failed");
        assert_eq!(mapping_status(3, 5), "partial");
        assert_eq!(mapping_status(5, 5), "completed");
    }

    #[test]
    fn line_amount_falls_back_to_rate() {
        let item = NewBoqItem {
            description: "24F ADSS".into(),
            quantity: Decimal::new(150, 0),
            rate: Some(Decimal::new(1250, 2)),
            ..Default::default()
        };
        assert_eq!(item.line_amount(), Some(Decimal::new(187500, 2)));

        let stated = NewBoqItem {
            amount: Some(Decimal::new(100, 0)),
            ..item
        };
        assert_eq!(stated.line_amount(), Some(Decimal::new(100, 0)));
    }
}
