//! Supplier directory endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::repos::suppliers::{NewSupplier, Supplier, SupplierChanges, SupplierFilter};
use crate::db::repos::SupplierRepo;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{
    like_pattern, non_blank, optional_one_of, optional_text, required_text,
};
use crate::models::status::SUPPLIER_STATUSES;
use crate::models::{Code, Email, Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct SupplierQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub preferred: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierRequest {
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

fn rating(value: Option<Decimal>) -> Result<Option<Decimal>, ValidationError> {
    match value {
        Some(r) if r < Decimal::ZERO || r > Decimal::from(5) => Err(ValidationError::OutOfRange {
            field: "rating",
            min: 0.0,
            max: 5.0,
        }),
        other => Ok(other),
    }
}

fn categories(values: Option<Vec<String>>) -> Option<Vec<String>> {
    values.map(|v| {
        v.into_iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    })
}

fn email(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    non_blank(value)
        .map(|e| Email::new("email", e).map(Email::into_string))
        .transpose()
}

impl SupplierRequest {
    pub fn into_new(self) -> Result<NewSupplier, ValidationError> {
        let code = self
            .supplier_code
            .as_deref()
            .ok_or(ValidationError::Missing { field: "supplier_code" })?;
        Ok(NewSupplier {
            supplier_code: Code::new("supplier_code", code)?.into_string(),
            company_name: required_text("company_name", self.company_name.as_deref())?,
            contact_person: optional_text("contact_person", self.contact_person.as_deref())?,
            email: email(self.email.as_deref())?,
            phone: optional_text("phone", self.phone.as_deref())?,
            address: self.address,
            city: optional_text("city", self.city.as_deref())?,
            province: optional_text("province", self.province.as_deref())?,
            country: optional_text("country", self.country.as_deref())?
                .unwrap_or_else(|| "South Africa".into()),
            categories: categories(self.categories).unwrap_or_default(),
            rating: rating(self.rating)?,
            status: optional_one_of("status", self.status.as_deref(), SUPPLIER_STATUSES)?
                .unwrap_or("active")
                .to_owned(),
            preferred: self.preferred.unwrap_or(false),
            notes: self.notes,
        })
    }

    pub fn into_changes(self) -> Result<SupplierChanges, ValidationError> {
        Ok(SupplierChanges {
            supplier_code: non_blank(self.supplier_code.as_deref())
                .map(|c| Code::new("supplier_code", c).map(Code::into_string))
                .transpose()?,
            company_name: self
                .company_name
                .as_deref()
                .map(|n| required_text("company_name", Some(n)))
                .transpose()?,
            contact_person: optional_text("contact_person", self.contact_person.as_deref())?,
            email: email(self.email.as_deref())?,
            phone: optional_text("phone", self.phone.as_deref())?,
            address: self.address,
            city: optional_text("city", self.city.as_deref())?,
            province: optional_text("province", self.province.as_deref())?,
            country: optional_text("country", self.country.as_deref())?,
            categories: categories(self.categories),
            rating: rating(self.rating)?,
            status: optional_one_of("status", self.status.as_deref(), SUPPLIER_STATUSES)?
                .map(str::to_owned),
            preferred: self.preferred,
            notes: self.notes,
        })
    }
}

/// GET /api/suppliers
async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<SupplierQuery>,
) -> ApiResult<Paginated<Supplier>> {
    let filter = SupplierFilter {
        search: non_blank(q.search.as_deref()).map(like_pattern),
        status: optional_one_of("status", q.status.as_deref(), SUPPLIER_STATUSES)?
            .map(str::to_owned),
        category: non_blank(q.category.as_deref()).map(str::to_lowercase),
        preferred: q.preferred,
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    Ok(ApiResponse::ok(SupplierRepo::new(&state.pool).list(&filter, page).await?))
}

/// POST /api/suppliers
async fn create_supplier(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SupplierRequest>,
) -> CreatedResult<Supplier> {
    let new = req.into_new()?;
    let supplier = SupplierRepo::new(&state.pool).create(&new).await?;
    tracing::info!(supplier_id = %supplier.id, code = %supplier.supplier_code, "supplier created");
    Ok(ApiResponse::created(supplier))
}

/// GET /api/suppliers/{id}
async fn get_supplier(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Supplier> {
    Ok(ApiResponse::ok(SupplierRepo::new(&state.pool).get(id).await?))
}

/// PUT /api/suppliers/{id}
async fn update_supplier(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<SupplierRequest>,
) -> ApiResult<Supplier> {
    let changes = req.into_changes()?;
    let supplier = SupplierRepo::new(&state.pool).update(id, &changes).await?;
    Ok(ApiResponse::with_message(supplier, "Supplier updated successfully"))
}

/// DELETE /api/suppliers/{id}
async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<serde_json::Value> {
    SupplierRepo::new(&state.pool).delete(id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "Supplier deleted successfully",
    ))
}

/// Supplier routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/api/suppliers/{id}",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{database_app, delete, get, json, offline_app, unique};

    fn valid() -> SupplierRequest {
        SupplierRequest {
            supplier_code: Some("SUP-001".into()),
            company_name: Some("Cape Fibre Supplies".into()),
            categories: Some(vec![" Cable ".into(), "".into()]),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_and_category_cleanup() {
        let new = valid().into_new().unwrap();
        assert_eq!(new.status, "active");
        assert_eq!(new.country, "South Africa");
        assert_eq!(new.categories, vec!["cable"]);
        assert!(!new.preferred);
    }

    #[test]
    fn rating_is_bounded() {
        let mut req = valid();
        req.rating = Some(Decimal::new(55, 1));
        assert!(matches!(
            req.into_new().unwrap_err(),
            ValidationError::OutOfRange { field: "rating", .. }
        ));
    }

    #[tokio::test]
    async fn unknown_status_filter_is_400() {
        let response = offline_app()
            .oneshot(get("/api/suppliers?status=dormant"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn supplier_lifecycle() {
        let app = database_app().await;
        let code = unique("SUP");
        let body = json!({ "supplier_code": code, "company_name": "Lifecycle Ltd" });

        let created = app.clone().oneshot(json("POST", "/api/suppliers", body.clone())).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = crate::http::test_support::body_json(created).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_owned();

        let dup = app.clone().oneshot(json("POST", "/api/suppliers", body)).await.unwrap();
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let gone = app
            .clone()
            .oneshot(delete(&format!("/api/suppliers/{id}")))
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::OK);
        let missing = app.oneshot(get(&format!("/api/suppliers/{id}"))).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
