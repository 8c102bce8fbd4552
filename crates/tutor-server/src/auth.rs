//! Bearer-token authentication

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use tutor_core::{Claims, MarketError};

use crate::error::{ApiError, api_error};
use crate::state::AppState;

/// The verified caller; rejects the request with 401 otherwise
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| api_error(MarketError::Auth("missing bearer token".into())))?;

        state.accounts.authenticate(token).map(AuthUser).map_err(api_error)
    }
}
