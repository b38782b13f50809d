//! OneMap CSV upload and import batch history

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    routing::{get, post},
    Router,
};
use fibreflow_core::onemap::{self, ImportReport};
use serde::Deserialize;

use crate::db::repos::onemap::ImportBatch;
use crate::db::repos::OneMapRepo;
use crate::http::error::ApiError;
use crate::http::extractors::ApiQuery;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::models::fields::{non_blank, optional_text};

/// Exports run to tens of thousands of rows
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const DELIMITER: u8 = b';';

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<u32>,
}

/// POST /api/onemap/upload
///
/// The body is the raw CSV export.
async fn upload(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<UploadQuery>,
    body: Bytes,
) -> ApiResult<ImportReport> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("CSV body is empty"));
    }
    let file_name = optional_text("file_name", q.file_name.as_deref())?
        .unwrap_or_else(|| "upload.csv".to_owned());
    let records = onemap::parse_csv(body.as_ref(), DELIMITER)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    if records.is_empty() {
        return Err(ApiError::bad_request("CSV contains no records"));
    }

    let report = OneMapRepo::new(&state.pool)
        .import(&file_name, &records)
        .await?;
    let message = if report.summary.verification_passed {
        "Import completed, verification passed"
    } else {
        "Import completed, verification failed"
    };
    Ok(ApiResponse::with_message(report, message))
}

/// GET /api/onemap/batches
async fn batches(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<BatchQuery>,
) -> ApiResult<Vec<ImportBatch>> {
    let limit = q.limit.unwrap_or(20).clamp(1, 200);
    Ok(ApiResponse::ok(OneMapRepo::new(&state.pool).batches(limit).await?))
}

/// GET /api/onemap/batches/{batch_id}/report
async fn batch_report(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> ApiResult<ImportReport> {
    let batch_id = non_blank(Some(&batch_id))
        .ok_or_else(|| ApiError::bad_request("batch id is required"))?
        .to_owned();
    Ok(ApiResponse::ok(
        OneMapRepo::new(&state.pool).report(&batch_id).await?,
    ))
}

/// OneMap routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/onemap/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/onemap/batches", get(batches))
        .route("/api/onemap/batches/{batch_id}/report", get(batch_report))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, get, offline_app};

    fn csv_upload(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/onemap/upload?file_name=lawley.csv")
            .header("content-type", "text/csv")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_body_is_400() {
        let response = offline_app().oneshot(csv_upload("  \n")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn header_only_is_400() {
        let response = offline_app()
            .oneshot(csv_upload("Property ID;Pole Number;Status\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn upload_stores_report() {
        let app = database_app().await;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let csv = format!(
            "\u{feff}Property ID;Pole Number;Drop Number;Status;Latitude;Longitude\n\
             {id};LAW.P.T001;;Pole Permission: Approved;-26.25;28.30\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/onemap/upload")
            .body(Body::from(csv))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["summary"]["new_records"], 1);
        let batch_id = body["data"]["batch_id"].as_str().unwrap().to_owned();

        let stored = app
            .oneshot(get(&format!("/api/onemap/batches/{batch_id}/report")))
            .await
            .unwrap();
        assert_eq!(stored.status(), StatusCode::OK);
    }
}
