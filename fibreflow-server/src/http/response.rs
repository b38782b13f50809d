//! Success envelope: `{success: true, data, message?}`

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(data))
    }
}

/// Handler result for 200 responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Handler result for 201 responses
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_omitted_when_absent() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert!(value.get("message").is_none());
    }

    #[test]
    fn created_is_201() {
        let (status, Json(body)) = ApiResponse::created("x");
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.success);
    }

    #[test]
    fn with_message() {
        let Json(body) = ApiResponse::with_message((), "Client deleted successfully");
        assert_eq!(body.message.as_deref(), Some("Client deleted successfully"));
    }
}
