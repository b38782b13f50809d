//! fibreflow-server: HTTP API and data layer for FibreFlow
//!
//! Clients, staff, projects, contractors with RAG scoring, procurement,
//! SOW tracking, analytics and OneMap imports over one Postgres pool.

pub mod db;
pub mod http;
pub mod models;

pub use db::{create_pool, create_pool_with_options, migrations};
pub use sqlx::PgPool;
pub use http::{build_router, run_server, ApiError, AppState, ServerConfig, ServerError};
