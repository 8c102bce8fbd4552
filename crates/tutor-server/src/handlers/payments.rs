use axum::{
    Json,
    extract::{Path, State},
};

use tutor_core::{BookingId, CourseId, Payment};

use super::acting_student;
use crate::auth::AuthUser;
use crate::error::{ApiResult, api_error};
use crate::state::AppState;

pub async fn pay_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<BookingId>,
) -> ApiResult<Payment> {
    state
        .payments
        .charge_for_booking(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn pay_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<CourseId>,
) -> ApiResult<Payment> {
    state
        .payments
        .charge_for_course(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn list_payments(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Payment>> {
    let student = acting_student(&state, &user)?;
    state
        .payments
        .list_for_student(student.id)
        .map(Json)
        .map_err(api_error)
}
