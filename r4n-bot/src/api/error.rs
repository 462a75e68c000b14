//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{SessionError, SubmitError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    /// Eurocore refused or failed the request
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Upstream(msg) => {
                tracing::error!("Eurocore error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotLoggedIn(_) => ApiError::Unauthorized(err.to_string()),
            SessionError::Client(ref client) if client.is_unauthorized() => {
                ApiError::Unauthorized(err.to_string())
            }
            SessionError::Client(ref client) if client.is_client_error() => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::Client(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Session(err) => err.into(),
            SubmitError::Client(ref client) if client.is_unauthorized() => {
                ApiError::Unauthorized(err.to_string())
            }
            SubmitError::Client(ref client) if client.is_client_error() => {
                ApiError::BadRequest(err.to_string())
            }
            SubmitError::Client(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
