//! Health check endpoints
//!
//! `/health` is a liveness probe with no I/O; `/api/health` also checks the
//! database.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// 503 body: the error envelope plus the probe result
#[derive(Serialize)]
pub struct Unhealthy {
    pub success: bool,
    pub status: &'static str,
    pub database: &'static str,
    pub error: String,
    pub code: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/health - 503 when the database cannot answer `SELECT 1`
async fn api_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatabaseHealth>, (StatusCode, Json<Unhealthy>)> {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Ok(Json(DatabaseHealth {
            status: "healthy",
            database: "connected",
            version: env!("CARGO_PKG_VERSION"),
        })),
        Err(e) => {
            tracing::warn!("health probe failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Unhealthy {
                    success: false,
                    status: "unhealthy",
                    database: "disconnected",
                    error: "database unreachable".into(),
                    code: "service_unavailable",
                }),
            ))
        }
    }
}

/// Liveness routes
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}

/// Readiness route backed by the pool
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(api_health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, offline_app};

    #[tokio::test]
    async fn health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn api_health_without_database_is_503() {
        let response = offline_app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = offline_app()
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let response = offline_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "method_not_allowed");
    }

    #[tokio::test]
    async fn wrong_method_on_api_route_is_405() {
        let response = offline_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/clients")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["success"], false);
    }
}
