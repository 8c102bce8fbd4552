use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use tutor_catalog::{CourseDetails, CourseUpdate, LessonUpdate, NewCourse, NewLesson};
use tutor_core::{Course, CourseId, Lesson, LessonId, ProfessorId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CourseQuery {
    #[serde(default)]
    pub professor_id: Option<ProfessorId>,
    #[serde(default)]
    pub search: Option<String>,
}

pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> ApiResult<Vec<Course>> {
    state
        .courses
        .list_courses(query.professor_id, query.search.as_deref())
        .map(Json)
        .map_err(api_error)
}

pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewCourse>,
) -> ApiResult<Course> {
    state
        .courses
        .create_course(user.0.user_id, payload)
        .map(Json)
        .map_err(api_error)
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<CourseId>,
) -> ApiResult<CourseDetails> {
    state.courses.get_course(id).map(Json).map_err(api_error)
}

pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<CourseId>,
    Json(update): Json<CourseUpdate>,
) -> ApiResult<Course> {
    state
        .courses
        .update_course(user.0.user_id, id, update)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<CourseId>,
) -> Result<StatusCode, ApiError> {
    state
        .courses
        .delete_course(user.0.user_id, id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<CourseId>,
    Json(payload): Json<NewLesson>,
) -> ApiResult<Lesson> {
    state
        .courses
        .add_lesson(user.0.user_id, course_id, payload)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn update_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<LessonId>,
    Json(update): Json<LessonUpdate>,
) -> ApiResult<Lesson> {
    state
        .courses
        .update_lesson(user.0.user_id, id, update)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<LessonId>,
) -> Result<StatusCode, ApiError> {
    state
        .courses
        .delete_lesson(user.0.user_id, id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
