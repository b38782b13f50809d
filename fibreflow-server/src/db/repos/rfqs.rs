//! Requests for quotation and their invited suppliers
//!
//! Every supplier invitation or removal is written to
//! `rfq_supplier_history` in the same transaction as the change, and the
//! `invited_suppliers` counter on the RFQ is refreshed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_RFQ: &str = "An RFQ with this RFQ number already exists";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Rfq {
    pub id: Uuid,
    pub project_id: Uuid,
    pub rfq_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_date: Option<NaiveDate>,
    pub response_deadline: Option<NaiveDate>,
    pub total_items: i32,
    pub invited_suppliers: i32,
    pub responses_received: i32,
    pub payment_terms: Option<String>,
    pub delivery_requirements: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvitedSupplier {
    pub supplier_id: Uuid,
    pub supplier_code: String,
    pub company_name: String,
    pub email: Option<String>,
    pub status: String,
    pub invited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RfqDetail {
    #[serde(flatten)]
    pub rfq: Rfq,
    pub suppliers: Vec<InvitedSupplier>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SupplierHistoryEntry {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub company_name: Option<String>,
    pub action: String,
    pub performed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRfq {
    pub rfq_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub issue_date: Option<NaiveDate>,
    pub response_deadline: Option<NaiveDate>,
    pub total_items: i32,
    pub payment_terms: Option<String>,
    pub delivery_requirements: Option<String>,
    pub created_by: Option<String>,
    pub supplier_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct RfqChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub response_deadline: Option<NaiveDate>,
    pub total_items: Option<i32>,
    pub responses_received: Option<i32>,
    pub payment_terms: Option<String>,
    pub delivery_requirements: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierAction {
    Invited,
    Removed,
}

impl SupplierAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Removed => "removed",
        }
    }
}

pub struct RfqRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RfqRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        status: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<Rfq>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM rfqs
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

    /// Create the RFQ and invite its initial suppliers in one transaction.
    pub async fn create(&self, project_id: Uuid, r: &NewRfq) -> Result<RfqDetail, DbError> {
        let mut tx = self.pool.begin().await?;
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO rfqs (
                project_id, rfq_number, title, description, status, issue_date,
                response_deadline, total_items, payment_terms, delivery_requirements, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(&r.rfq_number)
        .bind(&r.title)
        .bind(&r.description)
        .bind(&r.status)
        .bind(r.issue_date)
        .bind(r.response_deadline)
        .bind(r.total_items)
        .bind(&r.payment_terms)
        .bind(&r.delivery_requirements)
        .bind(&r.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(msg) if msg.contains("rfq_number") => {
                DbError::Conflict(DUPLICATE_RFQ.into())
            }
            DbError::Conflict(_) => DbError::not_found("project", project_id),
            other => other,
        })?;

        invite(&mut tx, row.0, &r.supplier_ids, r.created_by.as_deref()).await?;
        refresh_invited_count(&mut tx, row.0).await?;
        tx.commit().await?;

        self.get(project_id, row.0).await
    }

    async fn get_row(&self, project_id: Uuid, id: Uuid) -> Result<Rfq, DbError> {
        sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("rfq", id))
    }

    async fn suppliers_of(&self, id: Uuid) -> Result<Vec<InvitedSupplier>, DbError> {
        let rows = sqlx::query_as::<_, InvitedSupplier>(
            r#"
            SELECT s.id AS supplier_id, s.supplier_code, s.company_name, s.email,
                   rs.status, rs.invited_at
            FROM rfq_suppliers rs
            JOIN suppliers s ON s.id = rs.supplier_id
            WHERE rs.rfq_id = $1
            ORDER BY s.company_name
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, project_id: Uuid, id: Uuid) -> Result<RfqDetail, DbError> {
        let (rfq, suppliers) =
            tokio::try_join!(self.get_row(project_id, id), self.suppliers_of(id))?;
        Ok(RfqDetail { rfq, suppliers })
    }

    pub async fn update(&self, project_id: Uuid, id: Uuid, r: &RfqChanges) -> Result<Rfq, DbError> {
        sqlx::query_as::<_, Rfq>(
            r#"
            UPDATE rfqs SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                issue_date = COALESCE($6, issue_date),
                response_deadline = COALESCE($7, response_deadline),
                total_items = COALESCE($8, total_items),
                responses_received = COALESCE($9, responses_received),
                payment_terms = COALESCE($10, payment_terms),
                delivery_requirements = COALESCE($11, delivery_requirements),
                updated_at = NOW()
            WHERE id = $1 AND project_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&r.title)
        .bind(&r.description)
        .bind(&r.status)
        .bind(r.issue_date)
        .bind(r.response_deadline)
        .bind(r.total_items)
        .bind(r.responses_received)
        .bind(&r.payment_terms)
        .bind(&r.delivery_requirements)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("rfq", id))
    }

    pub async fn delete(&self, project_id: Uuid, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM rfqs WHERE id = $1 AND project_id = $2 RETURNING id")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("rfq", id))?;
        Ok(())
    }

    /// Invite more suppliers; ones already invited are left alone.
    pub async fn add_suppliers(
        &self,
        project_id: Uuid,
        id: Uuid,
        supplier_ids: &[Uuid],
        performed_by: Option<&str>,
    ) -> Result<Vec<InvitedSupplier>, DbError> {
        self.get_row(project_id, id).await?;
        let mut tx = self.pool.begin().await?;
        invite(&mut tx, id, supplier_ids, performed_by).await?;
        refresh_invited_count(&mut tx, id).await?;
        tx.commit().await?;
        self.suppliers_of(id).await
    }

    /// Make the invited set exactly `supplier_ids`.
    pub async fn replace_suppliers(
        &self,
        project_id: Uuid,
        id: Uuid,
        supplier_ids: &[Uuid],
        performed_by: Option<&str>,
    ) -> Result<Vec<InvitedSupplier>, DbError> {
        self.get_row(project_id, id).await?;
        let mut tx = self.pool.begin().await?;

        let dropped: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM rfq_suppliers
            WHERE rfq_id = $1 AND NOT (supplier_id = ANY($2))
            RETURNING supplier_id
            "#,
        )
        .bind(id)
        .bind(supplier_ids)
        .fetch_all(&mut *tx)
        .await?;
        let dropped: Vec<Uuid> = dropped.into_iter().map(|(s,)| s).collect();
        log_actions(&mut tx, id, &dropped, SupplierAction::Removed, performed_by).await?;

        invite(&mut tx, id, supplier_ids, performed_by).await?;
        refresh_invited_count(&mut tx, id).await?;
        tx.commit().await?;
        self.suppliers_of(id).await
    }

    pub async fn remove_suppliers(
        &self,
        project_id: Uuid,
        id: Uuid,
        supplier_ids: &[Uuid],
        performed_by: Option<&str>,
    ) -> Result<Vec<InvitedSupplier>, DbError> {
        self.get_row(project_id, id).await?;
        let mut tx = self.pool.begin().await?;

        let removed: Vec<(Uuid,)> = sqlx::query_as(
            "DELETE FROM rfq_suppliers WHERE rfq_id = $1 AND supplier_id = ANY($2) RETURNING supplier_id",
        )
        .bind(id)
        .bind(supplier_ids)
        .fetch_all(&mut *tx)
        .await?;
        let removed: Vec<Uuid> = removed.into_iter().map(|(s,)| s).collect();
        log_actions(&mut tx, id, &removed, SupplierAction::Removed, performed_by).await?;

        refresh_invited_count(&mut tx, id).await?;
        tx.commit().await?;
        self.suppliers_of(id).await
    }

    pub async fn supplier_history(
        &self,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<SupplierHistoryEntry>, DbError> {
        self.get_row(project_id, id).await?;
        let rows = sqlx::query_as::<_, SupplierHistoryEntry>(
            r#"
            SELECT h.id, h.supplier_id, s.company_name, h.action, h.performed_by, h.created_at
            FROM rfq_supplier_history h
            LEFT JOIN suppliers s ON s.id = h.supplier_id
            WHERE h.rfq_id = $1
            ORDER BY h.created_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Insert invitations, logging only the ones that are new.
async fn invite(
    conn: &mut PgConnection,
    rfq_id: Uuid,
    supplier_ids: &[Uuid],
    performed_by: Option<&str>,
) -> Result<(), DbError> {
    if supplier_ids.is_empty() {
        return Ok(());
    }
    let added: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO rfq_suppliers (rfq_id, supplier_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT (rfq_id, supplier_id) DO NOTHING
        RETURNING supplier_id
        "#,
    )
    .bind(rfq_id)
    .bind(supplier_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::Conflict(_) => DbError::InvalidInput("one or more suppliers do not exist".into()),
        other => other,
    })?;
    let added: Vec<Uuid> = added.into_iter().map(|(s,)| s).collect();
    log_actions(conn, rfq_id, &added, SupplierAction::Invited, performed_by).await
}

async fn log_actions(
    conn: &mut PgConnection,
    rfq_id: Uuid,
    supplier_ids: &[Uuid],
    action: SupplierAction,
    performed_by: Option<&str>,
) -> Result<(), DbError> {
    if supplier_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO rfq_supplier_history (rfq_id, supplier_id, action, performed_by)
        SELECT $1, UNNEST($2::uuid[]), $3, $4
        "#,
    )
    .bind(rfq_id)
    .bind(supplier_ids)
    .bind(action.as_str())
    .bind(performed_by)
    .execute(conn)
    .await?;
    Ok(())
}

async fn refresh_invited_count(conn: &mut PgConnection, rfq_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE rfqs
        SET invited_suppliers = (SELECT COUNT(*) FROM rfq_suppliers WHERE rfq_id = $1),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(rfq_id)
    .execute(conn)
    .await?;
    Ok(())
}
