use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use tutor_catalog::{ProfessorProfile, ProfessorUpdate, StudentProfile, StudentUpdate};
use tutor_core::{ProfessorId, StudentId};

use crate::auth::AuthUser;
use crate::error::{ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfessorQuery {
    #[serde(default)]
    pub subject: Option<String>,
}

pub async fn list_professors(
    State(state): State<AppState>,
    Query(query): Query<ProfessorQuery>,
) -> ApiResult<Vec<ProfessorProfile>> {
    state
        .profiles
        .list_professors(query.subject.as_deref())
        .map(Json)
        .map_err(api_error)
}

pub async fn get_professor(
    State(state): State<AppState>,
    Path(id): Path<ProfessorId>,
) -> ApiResult<ProfessorProfile> {
    state.profiles.get_professor(id).map(Json).map_err(api_error)
}

pub async fn update_professor(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfessorUpdate>,
) -> ApiResult<ProfessorProfile> {
    state
        .profiles
        .update_professor(user.0.user_id, update)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
) -> ApiResult<StudentProfile> {
    state.profiles.get_student(id).map(Json).map_err(api_error)
}

pub async fn update_student(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<StudentProfile> {
    state
        .profiles
        .update_student(user.0.user_id, update)
        .await
        .map(Json)
        .map_err(api_error)
}
