//! Global search endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use serde::Deserialize;

use crate::db::repos::search::SearchResults;
use crate::db::repos::SearchRepo;
use crate::http::error::ApiError;
use crate::http::extractors::ApiQuery;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::models::fields::non_blank;

/// Hits per entity kind when `limit` is not given
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

/// GET /api/search?q=&limit=
async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> ApiResult<SearchResults> {
    let query = non_blank(params.q.as_deref())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let results = SearchRepo::new(&state.pool).search(query, limit).await?;
    tracing::debug!(query, limit, hits = results.total, "search");
    Ok(ApiResponse::ok(results))
}

/// Search routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/search", get(search))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, get, json, offline_app, unique};

    #[tokio::test]
    async fn blank_query_is_400() {
        for uri in ["/api/search", "/api/search?q=%20%20"] {
            let response = offline_app().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn finds_projects_by_code() {
        let app = database_app().await;
        let code = unique("SRCH");
        app.clone()
            .oneshot(json(
                "POST",
                "/api/projects",
                json!({ "name": "Searchable", "project_code": code }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(get(&format!("/api/search?q={code}")))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["results"][0]["kind"], "project");
    }
}
