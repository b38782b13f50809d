//! Supplier directory

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_SUPPLIER: &str = "A supplier with this supplier code already exists";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Supplier {
    pub id: Uuid,
    pub supplier_code: String,
    pub company_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub categories: Vec<String>,
    pub rating: Option<Decimal>,
    pub status: String,
    pub preferred: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub supplier_code: String,
    pub company_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub categories: Vec<String>,
    pub rating: Option<Decimal>,
    pub status: String,
    pub preferred: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SupplierChanges {
    pub supplier_code: Option<String>,
    pub company_name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub categories: Option<Vec<String>>,
    pub rating: Option<Decimal>,
    pub status: Option<String>,
    pub preferred: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SupplierFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub preferred: Option<bool>,
}

pub struct SupplierRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SupplierRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &SupplierFilter,
        page: Pagination,
    ) -> Result<Paginated<Supplier>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM suppliers
            WHERE ($1::text IS NULL
                   OR company_name ILIKE $1 OR supplier_code ILIKE $1 OR contact_person ILIKE $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR $3 = ANY(categories))
              AND ($4::bool IS NULL OR preferred = $4)
            ORDER BY preferred DESC, company_name
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.status.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.preferred)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(&self, s: &NewSupplier) -> Result<Supplier, DbError> {
        sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (
                supplier_code, company_name, contact_person, email, phone, address, city,
                province, country, categories, rating, status, preferred, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(&s.supplier_code)
        .bind(&s.company_name)
        .bind(&s.contact_person)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.address)
        .bind(&s.city)
        .bind(&s.province)
        .bind(&s.country)
        .bind(&s.categories)
        .bind(s.rating)
        .bind(&s.status)
        .bind(s.preferred)
        .bind(&s.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_SUPPLIER))
    }

    pub async fn get(&self, id: Uuid) -> Result<Supplier, DbError> {
        sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("supplier", id))
    }

    pub async fn update(&self, id: Uuid, s: &SupplierChanges) -> Result<Supplier, DbError> {
        sqlx::query_as::<_, Supplier>(
            r#"
            UPDATE suppliers SET
                supplier_code = COALESCE($2, supplier_code),
                company_name = COALESCE($3, company_name),
                contact_person = COALESCE($4, contact_person),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                address = COALESCE($7, address),
                city = COALESCE($8, city),
                province = COALESCE($9, province),
                country = COALESCE($10, country),
                categories = COALESCE($11, categories),
                rating = COALESCE($12, rating),
                status = COALESCE($13, status),
                preferred = COALESCE($14, preferred),
                notes = COALESCE($15, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&s.supplier_code)
        .bind(&s.company_name)
        .bind(&s.contact_person)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.address)
        .bind(&s.city)
        .bind(&s.province)
        .bind(&s.country)
        .bind(&s.categories)
        .bind(s.rating)
        .bind(&s.status)
        .bind(s.preferred)
        .bind(&s.notes)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).with_conflict_message(DUPLICATE_SUPPLIER))?
        .ok_or_else(|| DbError::not_found("supplier", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM suppliers WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("supplier", id))?;
        Ok(())
    }
}
