//! Report generation

use std::sync::Arc;

use axum::{extract::State, routing::post, Router};
use chrono::{DateTime, Utc};
use fibreflow_core::analytics::ReportType;
use serde::{Deserialize, Serialize};

use crate::db::repos::analytics::{ReportData, ReportParams};
use crate::db::repos::AnalyticsRepo;
use crate::http::error::ApiError;
use crate::http::extractors::ApiJson;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::models::fields::optional_one_of;

const FORMATS: &[&str] = &["json", "pdf", "excel", "csv"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub report_type: Option<String>,
    pub format: Option<String>,
    #[serde(flatten)]
    pub params: ReportParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub report_type: ReportType,
    pub generated_at: DateTime<Utc>,
    pub parameters: ReportParams,
    pub format: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GeneratedReport {
    pub metadata: ReportMetadata,
    pub data: ReportData,
}

impl GenerateRequest {
    fn validate(self) -> Result<(ReportType, &'static str, ReportParams), ApiError> {
        let report_type = self
            .report_type
            .as_deref()
            .map(str::trim)
            .and_then(ReportType::parse)
            .ok_or_else(|| ApiError::bad_request("Invalid report type"))?;
        if let (Some(start), Some(end)) = (self.params.start_date, self.params.end_date) {
            if end < start {
                return Err(ApiError::bad_request("endDate cannot be before startDate"));
            }
        }
        let format = optional_one_of("format", self.format.as_deref(), FORMATS)?.unwrap_or("json");
        Ok((report_type, format, self.params))
    }
}

/// POST /api/analytics/reports/generate
async fn generate(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> ApiResult<GeneratedReport> {
    let (report_type, format, params) = req.validate()?;
    let repo = AnalyticsRepo::new(&state.pool);
    let data = repo.report(report_type, &params).await?;

    let logged = serde_json::json!({ "parameters": &params, "format": format });
    repo.log_report(report_type, &logged).await;
    tracing::info!(report_type = report_type.as_str(), format, "report generated");

    Ok(ApiResponse::ok(GeneratedReport {
        metadata: ReportMetadata {
            report_type,
            generated_at: Utc::now(),
            parameters: params,
            format,
        },
        data,
    }))
}

/// Report routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/analytics/reports/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, json, offline_app};

    fn request(value: serde_json::Value) -> GenerateRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parameters_are_camel_case() {
        let (kind, format, params) = request(json!({
            "reportType": "client-summary",
            "startDate": "2024-01-01",
            "department": "Operations"
        }))
        .validate()
        .unwrap();
        assert_eq!(kind, ReportType::ClientSummary);
        assert_eq!(format, "json");
        assert_eq!(params.start_date.map(|d| d.to_string()).as_deref(), Some("2024-01-01"));
        assert_eq!(params.department.as_deref(), Some("Operations"));
    }

    #[test]
    fn unknown_format_rejected() {
        let result = request(json!({ "reportType": "kpi-dashboard", "format": "docx" })).validate();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_report_type_is_400() {
        let response = offline_app()
            .oneshot(json(
                "POST",
                "/api/analytics/reports/generate",
                json!({ "reportType": "weather" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid report type");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn executive_summary_has_metadata() {
        let app = database_app().await;
        let response = app
            .oneshot(json(
                "POST",
                "/api/analytics/reports/generate",
                json!({ "reportType": "executive-summary" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["metadata"]["reportType"], "executive-summary");
        assert_eq!(body["data"]["metadata"]["format"], "json");
        assert!(body["data"]["data"].is_object());
    }
}
