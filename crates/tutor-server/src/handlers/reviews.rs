use axum::{
    Json,
    extract::{Path, State},
};

use tutor_catalog::NewReview;
use tutor_core::{CourseId, ProfessorId, Review};

use crate::auth::AuthUser;
use crate::error::{ApiResult, api_error};
use crate::state::AppState;

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewReview>,
) -> ApiResult<Review> {
    state
        .reviews
        .create_review(user.0.user_id, payload)
        .map(Json)
        .map_err(api_error)
}

pub async fn course_reviews(
    State(state): State<AppState>,
    Path(id): Path<CourseId>,
) -> ApiResult<Vec<Review>> {
    state.reviews.list_for_course(id).map(Json).map_err(api_error)
}

pub async fn professor_reviews(
    State(state): State<AppState>,
    Path(id): Path<ProfessorId>,
) -> ApiResult<Vec<Review>> {
    state.reviews.list_for_professor(id).map(Json).map_err(api_error)
}
