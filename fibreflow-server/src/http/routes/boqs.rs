//! Bill-of-quantities endpoints: import, stock mapping and exception handling

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::repos::boqs::{
    Boq, BoqChanges, BoqException, BoqItem, ExceptionResolution, MappingOutcome, NewBoq,
    NewBoqItem,
};
use crate::db::repos::BoqRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid, ValidUuidPair, ValidUuidTriple};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{non_negative, one_of, optional_one_of, optional_text, required_text};
use crate::models::status::{BOQ_STATUSES, RESOLUTION_STATUSES};
use crate::models::{Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct BoqQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExceptionQuery {
    pub resolution_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoqRequest {
    pub version: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub uploaded_by: Option<String>,
    pub file_name: Option<String>,
    pub currency: Option<String>,
}

fn currency(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            Ok(Some(c.to_ascii_uppercase()))
        }
        Some(_) => Err(ValidationError::InvalidFormat {
            field: "currency",
            reason: "must be a three-letter ISO code",
        }),
        None => Ok(None),
    }
}

impl BoqRequest {
    pub fn into_new(self) -> Result<NewBoq, ValidationError> {
        Ok(NewBoq {
            version: required_text("version", self.version.as_deref())?,
            title: optional_text("title", self.title.as_deref())?,
            description: self.description,
            status: optional_one_of("status", self.status.as_deref(), BOQ_STATUSES)?
                .unwrap_or("draft")
                .to_owned(),
            uploaded_by: optional_text("uploaded_by", self.uploaded_by.as_deref())?,
            file_name: optional_text("file_name", self.file_name.as_deref())?,
            currency: currency(self.currency.as_deref())?,
        })
    }

    pub fn into_changes(self) -> Result<BoqChanges, ApiError> {
        if self.version.is_some() {
            return Err(ApiError::bad_request("version cannot be changed"));
        }
        Ok(BoqChanges {
            title: optional_text("title", self.title.as_deref())?,
            description: self.description,
            status: optional_one_of("status", self.status.as_deref(), BOQ_STATUSES)?
                .map(str::to_owned),
            currency: currency(self.currency.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BoqItemRequest {
    pub line_number: Option<i32>,
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
}

impl BoqItemRequest {
    fn into_new(self) -> Result<NewBoqItem, ValidationError> {
        Ok(NewBoqItem {
            line_number: self.line_number,
            item_code: optional_text("item_code", self.item_code.as_deref())?,
            description: required_text("description", self.description.as_deref())?,
            unit: optional_text("unit", self.unit.as_deref())?,
            quantity: non_negative("quantity", self.quantity)?.unwrap_or(Decimal::ZERO),
            rate: non_negative("rate", self.rate)?,
            amount: non_negative("amount", self.amount)?,
            category: optional_text("category", self.category.as_deref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(flatten)]
    pub boq: BoqRequest,
    #[serde(default)]
    pub items: Vec<BoqItemRequest>,
}

impl ImportRequest {
    /// Item errors name the 1-based row that failed.
    pub fn validate(self) -> Result<(NewBoq, Vec<NewBoqItem>), ApiError> {
        if self.items.is_empty() {
            return Err(ApiError::bad_request("BOQ import requires at least one item"));
        }
        let boq = self.boq.into_new()?;
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                item.into_new()
                    .map_err(|e| ApiError::bad_request(format!("item {}: {}", i + 1, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((boq, items))
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution_status: String,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

impl ResolveRequest {
    fn validate(self) -> Result<ExceptionResolution, ApiError> {
        let status = one_of(
            "resolution_status",
            &self.resolution_status,
            RESOLUTION_STATUSES,
        )?;
        if status == "pending" {
            return Err(ApiError::bad_request(
                "resolution_status must be resolved or ignored",
            ));
        }
        Ok(ExceptionResolution {
            resolution_status: status.to_owned(),
            resolved_by: optional_text("resolved_by", self.resolved_by.as_deref())?,
            resolution_notes: self.resolution_notes,
        })
    }
}

/// GET /api/procurement/{project_id}/boqs
async fn list_boqs(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiQuery(q): ApiQuery<BoqQuery>,
) -> ApiResult<Paginated<Boq>> {
    let status = optional_one_of("status", q.status.as_deref(), BOQ_STATUSES)?;
    let page = Pagination::from_parts(q.page, q.per_page);
    Ok(ApiResponse::ok(
        BoqRepo::new(&state.pool).list(project_id, status, page).await?,
    ))
}

/// POST /api/procurement/{project_id}/boqs
async fn create_boq(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<BoqRequest>,
) -> CreatedResult<Boq> {
    let new = req.into_new()?;
    let boq = BoqRepo::new(&state.pool).create(project_id, &new).await?;
    Ok(ApiResponse::created(boq))
}

/// POST /api/procurement/{project_id}/boqs/import
async fn import_boq(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<ImportRequest>,
) -> CreatedResult<Boq> {
    let (new, items) = req.validate()?;
    let boq = BoqRepo::new(&state.pool)
        .import(project_id, &new, &items)
        .await?;
    Ok(ApiResponse::created(boq))
}

/// GET /api/procurement/{project_id}/boqs/{id}
async fn get_boq(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<Boq> {
    Ok(ApiResponse::ok(BoqRepo::new(&state.pool).get(project_id, id).await?))
}

/// PUT /api/procurement/{project_id}/boqs/{id}
async fn update_boq(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
    ApiJson(req): ApiJson<BoqRequest>,
) -> ApiResult<Boq> {
    let changes = req.into_changes()?;
    let boq = BoqRepo::new(&state.pool).update(project_id, id, &changes).await?;
    Ok(ApiResponse::with_message(boq, "BOQ updated successfully"))
}

/// DELETE /api/procurement/{project_id}/boqs/{id}
async fn delete_boq(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<serde_json::Value> {
    BoqRepo::new(&state.pool).delete(project_id, id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "BOQ deleted successfully",
    ))
}

/// GET /api/procurement/{project_id}/boqs/{id}/items
async fn list_items(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<Vec<BoqItem>> {
    Ok(ApiResponse::ok(BoqRepo::new(&state.pool).items(project_id, id).await?))
}

/// GET /api/procurement/{project_id}/boqs/{id}/exceptions
async fn list_exceptions(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
    ApiQuery(q): ApiQuery<ExceptionQuery>,
) -> ApiResult<Vec<BoqException>> {
    let status = optional_one_of(
        "resolution_status",
        q.resolution_status.as_deref(),
        RESOLUTION_STATUSES,
    )?;
    let exceptions = BoqRepo::new(&state.pool)
        .exceptions(project_id, id, status)
        .await?;
    Ok(ApiResponse::ok(exceptions))
}

/// POST /api/procurement/{project_id}/boqs/{id}/map
async fn map_boq(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<MappingOutcome> {
    let outcome = BoqRepo::new(&state.pool).map_to_stock(project_id, id).await?;
    Ok(ApiResponse::with_message(outcome, "BOQ mapping completed"))
}

/// POST /api/procurement/{project_id}/boqs/{id}/exceptions/{exception_id}/resolve
async fn resolve_exception(
    State(state): State<Arc<AppState>>,
    ValidUuidTriple(project_id, id, exception_id): ValidUuidTriple,
    ApiJson(req): ApiJson<ResolveRequest>,
) -> ApiResult<BoqException> {
    let resolution = req.validate()?;
    let exception = BoqRepo::new(&state.pool)
        .resolve_exception(project_id, id, exception_id, &resolution)
        .await?;
    Ok(ApiResponse::with_message(exception, "Exception resolved"))
}

/// BOQ routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/procurement/{project_id}/boqs",
            get(list_boqs).post(create_boq),
        )
        .route("/api/procurement/{project_id}/boqs/import", post(import_boq))
        .route(
            "/api/procurement/{project_id}/boqs/{id}",
            get(get_boq).put(update_boq).delete(delete_boq),
        )
        .route("/api/procurement/{project_id}/boqs/{id}/items", get(list_items))
        .route(
            "/api/procurement/{project_id}/boqs/{id}/exceptions",
            get(list_exceptions),
        )
        .route("/api/procurement/{project_id}/boqs/{id}/map", post(map_boq))
        .route(
            "/api/procurement/{project_id}/boqs/{id}/exceptions/{exception_id}/resolve",
            post(resolve_exception),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::http::test_support::{body_json, database_app, get, json, offline_app, unique};

    #[test]
    fn currency_is_normalised() {
        let req = BoqRequest {
            version: Some("v1".into()),
            currency: Some("zar".into()),
            ..Default::default()
        };
        let new = req.into_new().unwrap();
        assert_eq!(new.currency.as_deref(), Some("ZAR"));
        assert_eq!(new.status, "draft");

        let bad = BoqRequest {
            version: Some("v1".into()),
            currency: Some("rand".into()),
            ..Default::default()
        };
        assert!(bad.into_new().is_err());
    }

    #[test]
    fn import_reports_failing_row() {
        let req: ImportRequest = serde_json::from_value(json!({
            "version": "v1",
            "items": [
                { "description": "Pole 7m", "quantity": 10 },
                { "description": "Drop cable", "quantity": -1 }
            ]
        }))
        .unwrap();
        match req.validate() {
            Err(ApiError::BadRequest { message }) => assert!(message.starts_with("item 2:")),
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn pending_is_not_a_resolution() {
        let req = ResolveRequest {
            resolution_status: "Pending".into(),
            resolved_by: None,
            resolution_notes: None,
        };
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn malformed_exception_id_is_400() {
        let uri = format!(
            "/api/procurement/{}/boqs/{}/exceptions/not-a-uuid/resolve",
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let response = offline_app()
            .oneshot(json("POST", &uri, json!({ "resolution_status": "resolved" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn unmatched_items_raise_exceptions() {
        let app = database_app().await;
        let project = app
            .clone()
            .oneshot(json(
                "POST",
                "/api/projects",
                json!({ "name": "BOQ test", "project_code": unique("PRJ") }),
            ))
            .await
            .unwrap();
        let project_id = body_json(project).await["data"]["id"].as_str().unwrap().to_owned();
        let base = format!("/api/procurement/{project_id}/boqs");

        let imported = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("{base}/import"),
                json!({
                    "version": "v1",
                    "items": [{ "item_code": "NO-SUCH-ITEM", "description": "Mystery", "quantity": 3 }]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(imported.status(), StatusCode::CREATED);
        let boq_id = body_json(imported).await["data"]["id"].as_str().unwrap().to_owned();

        let mapped = app
            .clone()
            .oneshot(json("POST", &format!("{base}/{boq_id}/map"), json!({})))
            .await
            .unwrap();
        let mapped = body_json(mapped).await;
        assert_eq!(mapped["data"]["unmapped"], 1);

        let pending = app
            .oneshot(get(&format!("{base}/{boq_id}/exceptions?resolution_status=pending")))
            .await
            .unwrap();
        let pending = body_json(pending).await;
        assert_eq!(pending["data"].as_array().unwrap().len(), 1);
    }
}
