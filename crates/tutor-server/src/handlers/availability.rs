use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tutor_core::{AvailabilitySlot, ProfessorId, SlotId};

use super::acting_professor;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    #[serde(default)]
    pub include_booked: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".into()
}

pub async fn list_slots(
    State(state): State<AppState>,
    Path(professor_id): Path<ProfessorId>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<Vec<AvailabilitySlot>> {
    state
        .availability
        .list_by_professor(professor_id, query.include_booked)
        .map(Json)
        .map_err(api_error)
}

pub async fn create_slot(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewSlot>,
) -> ApiResult<AvailabilitySlot> {
    let professor = acting_professor(&state, &user)?;
    state
        .availability
        .create(professor.id, payload.start_time, payload.end_time, &payload.timezone)
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_slot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<SlotId>,
) -> Result<StatusCode, ApiError> {
    let professor = acting_professor(&state, &user)?;
    state
        .availability
        .delete(professor.id, id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
