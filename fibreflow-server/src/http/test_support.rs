//! Helpers shared by router and repository tests

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use sqlx::PgPool;

use super::server::{build_router, AppState};
use crate::db::{create_lazy_pool, create_pool, migrations};

/// Router over a pool that never connects; good for validation and
/// routing checks that must fail before any query runs.
pub(crate) fn offline_app() -> Router {
    let pool = create_lazy_pool("postgres://fibreflow@127.0.0.1:1/fibreflow").expect("lazy pool");
    build_router(AppState::new(pool), false)
}

/// Pool over `DATABASE_URL` with the schema applied.
pub(crate) async fn database_pool() -> PgPool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = create_pool(&url).await.expect("pool creation failed");
    migrations::run(&pool).await.expect("migrations failed");
    pool
}

/// Router over [`database_pool`].
pub(crate) async fn database_app() -> Router {
    build_router(AppState::new(database_pool().await), false)
}

/// Bare project row for repository tests.
pub(crate) async fn insert_project(pool: &PgPool) -> uuid::Uuid {
    let (id,): (uuid::Uuid,) =
        sqlx::query_as("INSERT INTO projects (project_code, name) VALUES ($1, $2) RETURNING id")
            .bind(unique("PRJ"))
            .bind("Repository test")
            .fetch_one(pool)
            .await
            .expect("project insert failed");
    id
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) fn json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Unique suffix so repeated database test runs don't collide on codes.
pub(crate) fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..10])
}
