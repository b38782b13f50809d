//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Uses JOINs or window counts for list operations (no N+1)
//! - Relies on constraints and maps violations to `DbError::Conflict`
//!   (no check-then-insert)
//! - Uses transactions for multi-step writes

pub mod analytics;
pub mod boqs;
pub mod cable_drums;
pub mod clients;
pub mod contractors;
pub mod onemap;
pub mod projects;
pub mod rag;
pub mod rfqs;
pub mod search;
pub mod sow;
pub mod staff;
pub mod stock;
pub mod suppliers;

pub use analytics::AnalyticsRepo;
pub use boqs::BoqRepo;
pub use cable_drums::CableDrumRepo;
pub use clients::ClientRepo;
pub use contractors::ContractorRepo;
pub use onemap::OneMapRepo;
pub use projects::ProjectRepo;
pub use rag::RagRepo;
pub use rfqs::RfqRepo;
pub use search::SearchRepo;
pub use sow::SowRepo;
pub use staff::StaffRepo;
pub use stock::StockRepo;
pub use suppliers::SupplierRepo;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::models::{Paginated, Pagination};

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// Constraint violation the caller can fix (duplicate key, row still referenced)
    #[error("{0}")]
    Conflict(String),

    /// Request is well-formed but cannot be applied to current data
    #[error("{0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    let what = db.constraint().unwrap_or("unique constraint");
                    return Self::Conflict(format!("duplicate value violates {}", what));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    let what = db.constraint().unwrap_or("foreign key");
                    return Self::Conflict(format!("referenced row conflict on {}", what));
                }
                _ => {}
            }
        }
        Self::Sqlx(e)
    }
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Replace the generic conflict text with a resource-specific message.
    pub fn with_conflict_message(self, message: &str) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(message.to_owned()),
            other => other,
        }
    }
}

/// Build a page from rows that carry `COUNT(*) OVER() AS total`.
pub(crate) fn paginate<T>(rows: Vec<PgRow>, page: Pagination) -> Result<Paginated<T>, DbError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let total = match rows.first() {
        Some(r) => r.try_get::<i64, _>("total")?,
        None => 0,
    };
    let items = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_override() {
        let err = DbError::Conflict("duplicate value violates contractors_email_key".into())
            .with_conflict_message("A contractor with this email already exists");
        assert_eq!(err.to_string(), "A contractor with this email already exists");

        let err = DbError::not_found("client", "abc").with_conflict_message("ignored");
        assert!(matches!(err, DbError::NotFound { resource: "client", .. }));
    }

    #[test]
    fn plain_sqlx_errors_stay_sqlx() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(_)));
    }
}
