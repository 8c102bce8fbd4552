use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use tutor_catalog::Registration;
use tutor_core::User;

use crate::error::{ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> ApiResult<AuthResponse> {
    let email = payload.email.clone();
    let password = payload.password.clone();
    state.accounts.register(payload).map_err(api_error)?;

    let (token, user) = state.accounts.login(&email, &password).map_err(api_error)?;
    Ok(Json(AuthResponse {
        token: token.to_string(),
        user,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let (token, user) = state
        .accounts
        .login(&payload.email, &payload.password)
        .map_err(api_error)?;
    Ok(Json(AuthResponse {
        token: token.to_string(),
        user,
    }))
}
