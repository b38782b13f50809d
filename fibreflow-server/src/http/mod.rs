//! HTTP server layer
//!
//! Axum server with:
//! - CORS (localhost only by default)
//! - Request tracing
//! - Graceful shutdown
//! - JSON envelopes for success and error responses

pub mod error;
pub mod extractors;
pub mod response;
pub mod routes;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ApiError;
pub use response::{ApiResponse, ApiResult};
pub use server::{build_router, run_server, AppState, ServerConfig, ServerError};
