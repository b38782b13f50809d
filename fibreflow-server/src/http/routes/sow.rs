//! SOW endpoints: pole, drop and fibre uploads plus project views

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use fibreflow_core::sow::{decode_items, DropInput, FibreInput, PoleInput};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::db::repos::sow::{FibreReport, ImportStatus, ProjectSow, SowRecord, SowSummary, UploadResult};
use crate::db::repos::SowRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid};
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::models::fields::{non_blank, parse_uuid};
use crate::models::ValidationError;

/// Items are decoded one by one in `upload`.
#[derive(Debug, Default, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FibreQuery {
    pub contractor: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

async fn upload<T: SowRecord + DeserializeOwned>(
    state: &AppState,
    project_id: uuid::Uuid,
    items: Vec<Value>,
) -> ApiResult<UploadResult> {
    if items.is_empty() {
        return Err(ApiError::bad_request("items cannot be empty"));
    }
    let result = SowRepo::new(&state.pool)
        .upsert(project_id, decode_items::<T>(items), state.batch_size)
        .await?;
    let message = format!(
        "{} upload processed: {} inserted, {} updated, {} errors",
        T::STEP.as_str(),
        result.inserted,
        result.updated,
        result.errors.len()
    );
    Ok(ApiResponse::with_message(result, message))
}

/// POST /api/sow/{project_id}/initialize
async fn initialize(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
) -> ApiResult<SowSummary> {
    let summary = SowRepo::new(&state.pool).initialize(project_id).await?;
    Ok(ApiResponse::with_message(summary, "SOW initialized"))
}

/// POST /api/sow/{project_id}/poles
async fn upload_poles(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<UploadRequest>,
) -> ApiResult<UploadResult> {
    upload::<PoleInput>(&state, project_id, req.items).await
}

/// POST /api/sow/{project_id}/drops
async fn upload_drops(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<UploadRequest>,
) -> ApiResult<UploadResult> {
    upload::<DropInput>(&state, project_id, req.items).await
}

/// POST /api/sow/{project_id}/fibre
async fn upload_fibre(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<UploadRequest>,
) -> ApiResult<UploadResult> {
    upload::<FibreInput>(&state, project_id, req.items).await
}

/// GET /api/sow/{project_id}/fibre
async fn fibre_report(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiQuery(q): ApiQuery<FibreQuery>,
) -> ApiResult<FibreReport> {
    let report = SowRepo::new(&state.pool)
        .fibre(
            project_id,
            non_blank(q.contractor.as_deref()),
            non_blank(q.status.as_deref()),
        )
        .await?;
    Ok(ApiResponse::ok(report))
}

/// GET /api/sow/{project_id}
async fn project_sow(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
) -> ApiResult<ProjectSow> {
    Ok(ApiResponse::ok(SowRepo::new(&state.pool).project(project_id).await?))
}

/// GET /api/sow/project?project_id=
async fn project_sow_by_query(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ProjectQuery>,
) -> ApiResult<ProjectSow> {
    let raw = non_blank(q.project_id.as_deref())
        .ok_or(ValidationError::Missing { field: "project_id" })?;
    let project_id = parse_uuid("project_id", raw)?;
    Ok(ApiResponse::ok(SowRepo::new(&state.pool).project(project_id).await?))
}

/// GET /api/sow/{project_id}/import-status
async fn import_status(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
) -> ApiResult<Vec<ImportStatus>> {
    Ok(ApiResponse::ok(
        SowRepo::new(&state.pool).import_status(project_id).await?,
    ))
}

/// SOW routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sow/project", get(project_sow_by_query))
        .route("/api/sow/{project_id}", get(project_sow))
        .route("/api/sow/{project_id}/initialize", post(initialize))
        .route("/api/sow/{project_id}/poles", post(upload_poles))
        .route("/api/sow/{project_id}/drops", post(upload_drops))
        .route("/api/sow/{project_id}/fibre", get(fibre_report).post(upload_fibre))
        .route("/api/sow/{project_id}/import-status", get(import_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, get, json, offline_app, unique};

    #[tokio::test]
    async fn empty_upload_is_400() {
        let uri = format!("/api/sow/{}/poles", uuid::Uuid::new_v4());
        let response = offline_app()
            .oneshot(json("POST", &uri, json!({ "items": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn project_query_requires_uuid() {
        let response = offline_app()
            .oneshot(get("/api/sow/project?project_id=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let missing = offline_app().oneshot(get("/api/sow/project")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    async fn create_project(app: &axum::Router) -> String {
        let project = app
            .clone()
            .oneshot(json(
                "POST",
                "/api/projects",
                json!({ "name": "SOW test", "project_code": unique("PRJ") }),
            ))
            .await
            .unwrap();
        body_json(project).await["data"]["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn repeated_pole_in_one_upload_updates() {
        let app = database_app().await;
        let base = format!("/api/sow/{}", create_project(&app).await);

        let items = json!({ "items": [
            { "pole_number": "LAW.P.D001", "status": "old" },
            { "pole_number": "LAW.P.D001", "status": "new" }
        ]});
        let response = app
            .clone()
            .oneshot(json("POST", &format!("{base}/poles"), items))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["inserted"], 1);
        assert_eq!(body["data"]["updated"], 1);
        assert!(body["data"]["errors"].as_array().unwrap().is_empty());

        let view = body_json(app.oneshot(get(&base)).await.unwrap()).await;
        assert_eq!(view["data"]["poles"][0]["status"], "new");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn malformed_item_is_reported_not_rejected() {
        let app = database_app().await;
        let base = format!("/api/sow/{}", create_project(&app).await);

        let items = json!({ "items": [
            { "pole_number": "LAW.P.E001" },
            { "pole_number": "LAW.P.E002", "pon_no": "seven" }
        ]});
        let response = app
            .clone()
            .oneshot(json("POST", &format!("{base}/poles"), items))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["inserted"], 1);
        let errors = body["data"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["item"], "#2");

        let view = body_json(app.oneshot(get(&base)).await.unwrap()).await;
        assert_eq!(view["data"]["poles"][0]["pole_number"], "LAW.P.E001");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn fibre_upload_counts_and_reports() {
        let app = database_app().await;
        let project_id = create_project(&app).await;
        let base = format!("/api/sow/{project_id}");

        let items = json!({ "items": [
            { "segment_id": "SEG-1", "length": 120.0, "contractor": "Acme", "status": "completed" },
            { "segment_id": "SEG-2", "distance": 80.0, "contractor": "Acme" },
            { "cable_size": "24F" }
        ]});
        let first = app
            .clone()
            .oneshot(json("POST", &format!("{base}/fibre"), items.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["data"]["inserted"], 2);
        assert_eq!(first["data"]["errors"].as_array().unwrap().len(), 1);

        let second = app
            .clone()
            .oneshot(json("POST", &format!("{base}/fibre"), items))
            .await
            .unwrap();
        assert_eq!(body_json(second).await["data"]["updated"], 2);

        let report = app
            .clone()
            .oneshot(get(&format!("{base}/fibre?contractor=Acme")))
            .await
            .unwrap();
        let report = body_json(report).await;
        assert_eq!(report["data"]["stats"]["total_segments"], 2);
        assert_eq!(report["data"]["completion_percentage"], 60.0);

        let status = app
            .oneshot(get(&format!("{base}/import-status")))
            .await
            .unwrap();
        let status = body_json(status).await;
        assert_eq!(status["data"][0]["import_type"], "fibre");
        assert_eq!(status["data"][0]["status"], "completed_with_errors");
    }
}
