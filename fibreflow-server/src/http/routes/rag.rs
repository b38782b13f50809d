//! RAG scoring endpoints: calculate, read and manually override

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use fibreflow_core::rag::{self, RagScore, ScoreType};
use serde::Deserialize;

use crate::db::repos::rag::{ManualUpdate, RagCalculation, RagSnapshot};
use crate::db::repos::RagRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid};
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::models::fields::optional_text;

const DEFAULT_TRIGGER: &str = "system";
const DEFAULT_UPDATER: &str = "manual";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    #[serde(default)]
    pub score_types: Vec<String>,
    pub triggered_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default)]
    pub include_history: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub score_type: Option<String>,
    pub score: Option<String>,
    pub reason: Option<String>,
    pub updated_by: Option<String>,
}

impl OverrideRequest {
    fn parse(&self) -> Result<(ScoreType, RagScore), ApiError> {
        let score_type = self
            .score_type
            .as_deref()
            .and_then(ScoreType::parse)
            .ok_or_else(|| ApiError::bad_request("Invalid score type"))?;
        let score = self
            .score
            .as_deref()
            .and_then(RagScore::parse)
            .ok_or_else(|| ApiError::bad_request("Score must be green, amber, or red"))?;
        Ok((score_type, score))
    }
}

/// POST /api/contractors/{id}/rag/calculate
async fn calculate_rag(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<CalculateRequest>,
) -> ApiResult<RagCalculation> {
    let components = rag::select_components(&req.score_types)
        .map_err(|name| ApiError::bad_request(format!("Invalid score type: {}", name)))?;
    let triggered_by = optional_text("triggeredBy", req.triggered_by.as_deref())?;

    let result = RagRepo::new(&state.pool)
        .calculate(id, &components, triggered_by.as_deref().unwrap_or(DEFAULT_TRIGGER))
        .await?;
    Ok(ApiResponse::with_message(result, "RAG scores calculated successfully"))
}

/// GET /api/contractors/{id}/rag
async fn get_rag(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiQuery(q): ApiQuery<SnapshotQuery>,
) -> ApiResult<RagSnapshot> {
    let snapshot = RagRepo::new(&state.pool).snapshot(id, q.include_history).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// PUT /api/contractors/{id}/rag
async fn override_rag(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<OverrideRequest>,
) -> ApiResult<ManualUpdate> {
    let (score_type, score) = req.parse()?;
    let reason = optional_text("reason", req.reason.as_deref())?;
    let updated_by = optional_text("updatedBy", req.updated_by.as_deref())?;

    let update = RagRepo::new(&state.pool)
        .set_score(
            id,
            score_type,
            score,
            reason.as_deref(),
            updated_by.as_deref().unwrap_or(DEFAULT_UPDATER),
        )
        .await?;
    tracing::info!(
        contractor_id = %id,
        score_type = score_type.as_str(),
        old = %update.old_score,
        new = %update.new_score,
        "RAG score overridden"
    );
    let message = format!("RAG {} score updated successfully", score_type.as_str());
    Ok(ApiResponse::with_message(update, message))
}

/// RAG routes, nested under contractors
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/contractors/{id}/rag", get(get_rag).put(override_rag))
        .route("/api/contractors/{id}/rag/calculate", post(calculate_rag))
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
    fn override_requires_known_type_and_score() {
        let req = OverrideRequest {
            score_type: Some("vibes".into()),
            score: Some("green".into()),
            ..Default::default()
        };
        assert!(matches!(req.parse(), Err(ApiError::BadRequest { message }) if message == "Invalid score type"));

        let req = OverrideRequest {
            score_type: Some("Safety".into()),
            score: Some("purple".into()),
            ..Default::default()
        };
        assert!(req.parse().is_err());

        let req = OverrideRequest {
            score_type: Some("safety".into()),
            score: Some("RED".into()),
            ..Default::default()
        };
        assert_eq!(req.parse().unwrap(), (ScoreType::Safety, RagScore::Red));
    }

    #[tokio::test]
    async fn unknown_calculation_type_is_400() {
        let uri = format!("/api/contractors/{}/rag/calculate", Uuid::new_v4());
        let response = offline_app()
            .oneshot(json("POST", &uri, json!({ "scoreTypes": ["financial", "karma"] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid score type: karma");
    }

    #[tokio::test]
    async fn bad_override_score_is_400() {
        let uri = format!("/api/contractors/{}/rag", Uuid::new_v4());
        let response = offline_app()
            .oneshot(json("PUT", &uri, json!({ "scoreType": "overall", "score": "blue" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Score must be green, amber, or red"
        );
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn new_contractor_scores_red_on_finance_and_compliance() {
        let app = database_app().await;
        let reg = unique("RAG");
        let response = app
            .clone()
            .oneshot(json(
                "POST",
                "/api/contractors",
                json!({
                    "company_name": "Unscored Trenching",
                    "registration_number": reg,
                    "contact_person": "Thabo",
                    "email": format!("{}@trench.test", reg.to_lowercase()),
                }),
            ))
            .await
            .unwrap();
        let id = body_json(response).await["data"]["id"].as_str().unwrap().to_owned();

        let response = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("/api/contractors/{}/rag/calculate", id),
                json!({ "scoreTypes": ["all"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["scores"]["financial"], "red");
        assert_eq!(body["data"]["scores"]["compliance"], "red");
        assert_eq!(body["data"]["scores"]["overall"], "red");

        let response = app
            .clone()
            .oneshot(json(
                "PUT",
                &format!("/api/contractors/{}/rag", id),
                json!({ "scoreType": "financial", "score": "green", "updatedBy": "auditor" }),
            ))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await["message"],
            "RAG financial score updated successfully"
        );

        let response = app
            .oneshot(get(&format!("/api/contractors/{}/rag?include_history=true", id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["current"]["scores"]["financial"], "green");
        assert!(body["data"]["history"].as_array().unwrap().len() >= 3);
    }
}
