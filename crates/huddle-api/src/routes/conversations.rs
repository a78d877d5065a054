//! Opening one-to-one conversations from a server's member list.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use huddle_common::error::HuddleResult;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, services::conversations, services::identity, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/servers/{server_id}/conversations",
            get(list_conversations),
        )
        .route(
            "/servers/{server_id}/conversations/{member_id}",
            post(open_conversation),
        )
}

/// POST /api/servers/:server_id/conversations/:member_id: get or create.
async fn open_conversation(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((server_id, member_id)): Path<(Uuid, Uuid)>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let opened =
        conversations::open_with_member(&state.db, server_id, profile.id, member_id).await?;

    Ok(Json(json!({
        "message": "Conversation opened",
        "conversation": opened.conversation,
        "member": opened.me,
        "otherMember": opened.other,
    })))
}

/// GET /api/servers/:server_id/conversations
async fn list_conversations(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let list = conversations::list_for_server(&state.db, server_id, profile.id).await?;
    Ok(Json(json!({ "message": "Conversations fetched", "conversations": list })))
}
