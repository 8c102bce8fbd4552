use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use tutor_catalog::ConversationSummary;
use tutor_core::{Conversation, ConversationId, Message, ProfessorId};

use crate::auth::AuthUser;
use crate::error::{ApiResult, api_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartConversation {
    pub professor_id: ProfessorId,
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub body: String,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<ConversationSummary>> {
    state
        .messaging
        .list_conversations(user.0.user_id)
        .map(Json)
        .map_err(api_error)
}

pub async fn start_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<StartConversation>,
) -> ApiResult<Conversation> {
    state
        .messaging
        .start_conversation(user.0.user_id, payload.professor_id)
        .map(Json)
        .map_err(api_error)
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ConversationId>,
) -> ApiResult<Vec<Message>> {
    state
        .messaging
        .list_messages(user.0.user_id, id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ConversationId>,
    Json(payload): Json<SendMessage>,
) -> ApiResult<Message> {
    state
        .messaging
        .send_message(user.0.user_id, id, &payload.body)
        .await
        .map(Json)
        .map_err(api_error)
}
