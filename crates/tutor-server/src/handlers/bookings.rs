use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use tutor_core::{BookingId, CourseId, Role, SlotId};
use tutor_scheduling::{BookingDetails, NewBooking};

use super::{acting_professor, acting_student};
use crate::auth::AuthUser;
use crate::error::{ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub availability_id: SlotId,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BookingRequest>,
) -> ApiResult<BookingDetails> {
    let student = acting_student(&state, &user)?;
    state
        .bookings
        .create(NewBooking {
            student_id: student.id,
            availability_id: payload.availability_id,
            course_id: payload.course_id,
            notes: payload.notes,
        })
        .await
        .map(Json)
        .map_err(api_error)
}

/// The caller's bookings from their side of the table
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<BookingDetails>> {
    let bookings = match user.0.role {
        Role::Student => {
            let student = acting_student(&state, &user)?;
            state.bookings.list_for_student(student.id)
        }
        Role::Professor => {
            let professor = acting_professor(&state, &user)?;
            state.bookings.list_for_professor(professor.id)
        }
    };
    bookings.map(Json).map_err(api_error)
}

pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<BookingId>,
) -> ApiResult<BookingDetails> {
    state.bookings.get(user.0.user_id, id).map(Json).map_err(api_error)
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<BookingId>,
) -> ApiResult<BookingDetails> {
    state
        .bookings
        .cancel(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<BookingId>,
) -> ApiResult<BookingDetails> {
    state
        .bookings
        .confirm(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<BookingId>,
) -> ApiResult<BookingDetails> {
    state
        .bookings
        .complete(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}
