//! Cable drum endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::cable_drums::{CableDrum, DrumChanges, DrumFilter, NewDrum, UsageOutcome};
use crate::db::repos::CableDrumRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid, ValidUuidPair};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{non_blank, optional_one_of, optional_text, required_text};
use crate::models::status::DRUM_STATUSES;
use crate::models::{Code, Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct DrumQuery {
    pub status: Option<String>,
    pub cable_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DrumRequest {
    pub drum_number: Option<String>,
    pub cable_type: Option<String>,
    pub cable_size: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub original_length: Option<Decimal>,
    pub remaining_length: Option<Decimal>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl DrumRequest {
    pub fn into_new(self) -> Result<NewDrum, ApiError> {
        let drum_number = self
            .drum_number
            .as_deref()
            .ok_or(ValidationError::Missing { field: "drum_number" })?;
        let original = self
            .original_length
            .ok_or(ValidationError::Missing { field: "original_length" })?;
        if original <= Decimal::ZERO {
            return Err(ApiError::bad_request("original_length must be positive"));
        }
        if let Some(remaining) = self.remaining_length {
            if remaining < Decimal::ZERO || remaining > original {
                return Err(ApiError::bad_request(
                    "remaining_length must be between 0 and original_length",
                ));
            }
        }

        Ok(NewDrum {
            drum_number: Code::new("drum_number", drum_number)?.into_string(),
            cable_type: required_text("cable_type", self.cable_type.as_deref())?,
            cable_size: optional_text("cable_size", self.cable_size.as_deref())?,
            supplier_id: self.supplier_id,
            original_length: original,
            remaining_length: self.remaining_length,
            status: optional_one_of("status", self.status.as_deref(), DRUM_STATUSES)?
                .unwrap_or("available")
                .to_owned(),
            location: optional_text("location", self.location.as_deref())?,
            notes: self.notes,
        })
    }

    /// Lengths only change through usage records.
    pub fn into_changes(self) -> Result<DrumChanges, ApiError> {
        if self.drum_number.is_some()
            || self.original_length.is_some()
            || self.remaining_length.is_some()
        {
            return Err(ApiError::bad_request(
                "drum_number and lengths cannot be changed; record usage instead",
            ));
        }
        Ok(DrumChanges {
            cable_type: self
                .cable_type
                .as_deref()
                .map(|t| required_text("cable_type", Some(t)))
                .transpose()?,
            cable_size: optional_text("cable_size", self.cable_size.as_deref())?,
            supplier_id: self.supplier_id,
            status: optional_one_of("status", self.status.as_deref(), DRUM_STATUSES)?
                .map(str::to_owned),
            location: optional_text("location", self.location.as_deref())?,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UsageRequest {
    pub length_used: Decimal,
    pub used_for: Option<String>,
    pub used_by: Option<String>,
}

/// GET /api/procurement/{project_id}/cable-drums
async fn list_drums(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiQuery(q): ApiQuery<DrumQuery>,
) -> ApiResult<Paginated<CableDrum>> {
    let filter = DrumFilter {
        status: optional_one_of("status", q.status.as_deref(), DRUM_STATUSES)?.map(str::to_owned),
        cable_type: non_blank(q.cable_type.as_deref()).map(str::to_owned),
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let drums = CableDrumRepo::new(&state.pool)
        .list(project_id, &filter, page)
        .await?;
    Ok(ApiResponse::ok(drums))
}

/// POST /api/procurement/{project_id}/cable-drums
async fn create_drum(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<DrumRequest>,
) -> CreatedResult<CableDrum> {
    let new = req.into_new()?;
    let drum = CableDrumRepo::new(&state.pool).create(project_id, &new).await?;
    Ok(ApiResponse::created(drum))
}

/// GET /api/procurement/{project_id}/cable-drums/{id}
async fn get_drum(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<CableDrum> {
    Ok(ApiResponse::ok(CableDrumRepo::new(&state.pool).get(project_id, id).await?))
}

/// PUT /api/procurement/{project_id}/cable-drums/{id}
async fn update_drum(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
    ApiJson(req): ApiJson<DrumRequest>,
) -> ApiResult<CableDrum> {
    let changes = req.into_changes()?;
    let drum = CableDrumRepo::new(&state.pool)
        .update(project_id, id, &changes)
        .await?;
    Ok(ApiResponse::with_message(drum, "Cable drum updated successfully"))
}

/// DELETE /api/procurement/{project_id}/cable-drums/{id}
async fn delete_drum(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<serde_json::Value> {
    CableDrumRepo::new(&state.pool).delete(project_id, id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "Cable drum deleted successfully",
    ))
}

/// POST /api/procurement/{project_id}/cable-drums/{id}/usage
async fn record_usage(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
    ApiJson(req): ApiJson<UsageRequest>,
) -> ApiResult<UsageOutcome> {
    if req.length_used <= Decimal::ZERO {
        return Err(ApiError::bad_request("length_used must be positive"));
    }
    let used_for = optional_text("used_for", req.used_for.as_deref())?;
    let used_by = optional_text("used_by", req.used_by.as_deref())?;
    let outcome = CableDrumRepo::new(&state.pool)
        .record_usage(
            project_id,
            id,
            req.length_used,
            used_for.as_deref(),
            used_by.as_deref(),
        )
        .await?;
    Ok(ApiResponse::with_message(outcome, "Drum usage recorded"))
}

/// Cable drum routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/procurement/{project_id}/cable-drums",
            get(list_drums).post(create_drum),
        )
        .route(
            "/api/procurement/{project_id}/cable-drums/{id}",
            get(get_drum).put(update_drum).delete(delete_drum),
        )
        .route(
            "/api/procurement/{project_id}/cable-drums/{id}/usage",
            post(record_usage),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, json, offline_app, unique};

    fn valid() -> DrumRequest {
        DrumRequest {
            drum_number: Some("DRM-0042".into()),
            cable_type: Some("ADSS 24F".into()),
            original_length: Some(Decimal::new(2000, 0)),
            ..Default::default()
        }
    }

    #[test]
    fn new_drum_defaults_to_available() {
        let new = valid().into_new().unwrap();
        assert_eq!(new.status, "available");
        assert_eq!(new.remaining_length, None);
    }

    #[test]
    fn remaining_cannot_exceed_original() {
        let mut req = valid();
        req.remaining_length = Some(Decimal::new(2500, 0));
        assert!(req.into_new().is_err());
    }

    #[test]
    fn update_cannot_touch_lengths() {
        let req = DrumRequest {
            remaining_length: Some(Decimal::ONE),
            ..Default::default()
        };
        assert!(req.into_changes().is_err());
    }

    #[tokio::test]
    async fn zero_usage_is_400() {
        let uri = format!(
            "/api/procurement/{}/cable-drums/{}/usage",
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let response = offline_app()
            .oneshot(json("POST", &uri, json!({ "length_used": 0 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn usage_deducts_until_empty() {
        let app = database_app().await;
        let project = app
            .clone()
            .oneshot(json(
                "POST",
                "/api/projects",
                json!({ "name": "Drum test", "project_code": unique("PRJ") }),
            ))
            .await
            .unwrap();
        let project_id = body_json(project).await["data"]["id"].as_str().unwrap().to_owned();
        let base = format!("/api/procurement/{project_id}/cable-drums");

        let created = app
            .clone()
            .oneshot(json(
                "POST",
                &base,
                json!({ "drum_number": "DRM-1", "cable_type": "ADSS", "original_length": 100 }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let drum_id = body_json(created).await["data"]["id"].as_str().unwrap().to_owned();
        let usage = |len: i64| {
            json(
                "POST",
                &format!("{base}/{drum_id}/usage"),
                json!({ "length_used": len, "used_for": "LAW.P.A001" }),
            )
        };

        let over = app.clone().oneshot(usage(150)).await.unwrap();
        assert_eq!(over.status(), StatusCode::BAD_REQUEST);

        let used = app.clone().oneshot(usage(100)).await.unwrap();
        assert_eq!(used.status(), StatusCode::OK);
        let body = body_json(used).await;
        assert_eq!(body["data"]["drum"]["status"], "completed");
    }
}
