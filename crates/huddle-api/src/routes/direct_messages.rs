//! Conversation message routes. Same operations as channel messages,
//! scoped by `?conversationId=` and restricted to the two participants.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use huddle_common::{
    error::HuddleResult,
    models::{CreateMessageRequest, MessageScope, UpdateMessageRequest},
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{messages::new_message, required, ScopeQuery};
use crate::{
    middleware::AuthContext,
    services::{identity, messages},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/direct-messages", get(get_direct_messages))
        .route("/socket/direct-messages", post(send_direct_message))
        .route(
            "/socket/direct-messages/{message_id}",
            patch(edit_direct_message).delete(delete_direct_message),
        )
}

fn conversation_scope(query: &ScopeQuery) -> HuddleResult<MessageScope> {
    required(query.conversation_id, "Conversation ID").map(MessageScope::Conversation)
}

/// GET /api/direct-messages?conversationId=&cursor=&limit=
async fn get_direct_messages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let scope = conversation_scope(&query)?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let page = messages::list_page(
        &state,
        scope,
        profile.id,
        query.cursor.as_deref(),
        query.limit,
    )
    .await?;

    Ok(Json(json!({
        "message": "Messages fetched",
        "messages": page.messages,
        "nextCursor": page.next_cursor,
    })))
}

/// POST /api/socket/direct-messages?conversationId=
async fn send_direct_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<CreateMessageRequest>,
) -> HuddleResult<Json<Value>> {
    let scope = conversation_scope(&query)?;
    let input = new_message(body)?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let created = messages::append(&state, scope, profile.id, input).await?;
    Ok(Json(json!({ "message": "Message sent", "data": created })))
}

/// PATCH /api/socket/direct-messages/:message_id?conversationId=
async fn edit_direct_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<UpdateMessageRequest>,
) -> HuddleResult<Json<Value>> {
    let scope = conversation_scope(&query)?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let updated =
        messages::edit(&state, scope, message_id, profile.id, body.content.as_deref()).await?;
    Ok(Json(json!({ "message": "Message updated", "data": updated })))
}

/// DELETE /api/socket/direct-messages/:message_id?conversationId=
async fn delete_direct_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let scope = conversation_scope(&query)?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let deleted = messages::soft_delete(&state, scope, message_id, profile.id).await?;
    Ok(Json(json!({ "message": "Message deleted", "data": deleted })))
}
