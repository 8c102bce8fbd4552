//! HTTP Handlers
//!
//! Thin glue: extract, call one service, map the error.

pub mod accounts;
pub mod availability;
pub mod bookings;
pub mod courses;
pub mod messages;
pub mod payments;
pub mod profiles;
pub mod reviews;

use axum::{Json, extract::State};
use serde::Serialize;

use tutor_core::directory;
use tutor_core::{Professor, Student};

use crate::auth::AuthUser;
use crate::error::{ApiError, api_error};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payment_provider: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payment_provider: state.payments.provider_name(),
    })
}

fn acting_professor(state: &AppState, user: &AuthUser) -> Result<Professor, ApiError> {
    directory::require_professor(&*state.store, user.0.user_id).map_err(api_error)
}

fn acting_student(state: &AppState, user: &AuthUser) -> Result<Student, ApiError> {
    directory::require_student(&*state.store, user.0.user_id).map_err(api_error)
}
