//! Error responses

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

use tutor_core::{ErrorKind, MarketError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Payment => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a domain error onto its HTTP response
pub fn api_error(err: MarketError) -> ApiError {
    let kind = err.kind();
    match kind {
        ErrorKind::Internal => tracing::error!(error = %err, "Request failed"),
        ErrorKind::Unavailable => tracing::warn!(error = %err, "Request timed out on a lock"),
        _ => tracing::debug!(error = %err, "Request rejected"),
    }

    (
        status_for(kind),
        Json(ErrorResponse {
            error: err.user_message(),
            code: kind.as_str().into(),
        }),
    )
}
