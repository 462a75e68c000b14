//! User API Handlers
//!
//! Eurocore login and registration for chat users.

use axum::{
    Json,
    extract::{Path, State},
};
use r4n_core::domain::job::UserRef;
use r4n_core::dto::user::Credentials;
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=20;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    fn into_credentials(self) -> ApiResult<Credentials> {
        let credentials = Credentials::new(self.username, self.password);

        if !USERNAME_LEN.contains(&credentials.username.chars().count()) {
            return Err(ApiError::BadRequest(
                "username must be 3 to 20 characters".to_string(),
            ));
        }
        if !PASSWORD_LEN.contains(&credentials.password.chars().count()) {
            return Err(ApiError::BadRequest(
                "password must be 8 to 20 characters".to_string(),
            ));
        }

        Ok(credentials)
    }
}

/// POST /users/{id}/login
/// Log a chat user in to eurocore
pub async fn login(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<UserRef>> {
    tracing::debug!("Logging in user {}", user_id);

    let user = state
        .sessions
        .login(user_id, req.into_credentials()?)
        .await?;

    Ok(Json(user))
}

/// POST /users/{id}/register
/// Register a chat user with eurocore
pub async fn register(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<UserRef>> {
    tracing::debug!("Registering user {}", user_id);

    let user = state
        .sessions
        .register(user_id, req.into_credentials()?)
        .await?;

    Ok(Json(user))
}
