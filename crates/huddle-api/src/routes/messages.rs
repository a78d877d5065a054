//! Channel message routes: history, send, edit, delete.
//!
//! Mutations go through `services::messages`, which publishes to the
//! channel's topic once the write has landed.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use huddle_common::{
    error::{HuddleError, HuddleResult},
    models::{Attachment, CreateMessageRequest, MessageScope, UpdateMessageRequest},
    validation::validate_request,
};
use huddle_db::repository::channels;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{required, ScopeQuery};
use crate::{
    middleware::AuthContext,
    services::{identity, messages, messages::NewMessage},
    AppState,
};

/// Message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", get(get_messages))
        .route("/socket/messages", post(send_message))
        .route(
            "/socket/messages/{message_id}",
            patch(edit_message).delete(delete_message),
        )
}

/// Convert the wire body into service input. A file type without a file URL
/// is rejected; the body rules themselves are checked by the service.
pub(crate) fn new_message(body: CreateMessageRequest) -> HuddleResult<NewMessage> {
    validate_request(&body)?;
    let attachment = match (body.file_url, body.file_type) {
        (Some(url), file_type) => Some(Attachment {
            url,
            content_type: file_type.unwrap_or_default(),
        }),
        (None, Some(_)) => return Err(HuddleError::validation("File type given without a file URL")),
        (None, None) => None,
    };
    Ok(NewMessage {
        content: body.content,
        attachment,
    })
}

/// `?serverId=&channelId=` as a channel scope, checking the channel belongs
/// to the server.
async fn channel_scope(state: &AppState, query: &ScopeQuery) -> HuddleResult<MessageScope> {
    let server_id = required(query.server_id, "Server ID")?;
    let channel_id = required(query.channel_id, "Channel ID")?;
    channels::find_in_server(&state.db.pool, channel_id, server_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Channel"))?;
    Ok(MessageScope::Channel(channel_id))
}

/// GET /api/messages?channelId=&cursor=&limit=
async fn get_messages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let channel_id = required(query.channel_id, "Channel ID")?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let page = messages::list_page(
        &state,
        MessageScope::Channel(channel_id),
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

/// POST /api/socket/messages?serverId=&channelId=
async fn send_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<CreateMessageRequest>,
) -> HuddleResult<Json<Value>> {
    let scope = channel_scope(&state, &query).await?;
    let input = new_message(body)?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let created = messages::append(&state, scope, profile.id, input).await?;
    Ok(Json(json!({ "message": "Message sent", "data": created })))
}

/// PATCH /api/socket/messages/:message_id?serverId=&channelId=
async fn edit_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<UpdateMessageRequest>,
) -> HuddleResult<Json<Value>> {
    let scope = channel_scope(&state, &query).await?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let updated =
        messages::edit(&state, scope, message_id, profile.id, body.content.as_deref()).await?;
    Ok(Json(json!({ "message": "Message updated", "data": updated })))
}

/// DELETE /api/socket/messages/:message_id?serverId=&channelId=
async fn delete_message(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let scope = channel_scope(&state, &query).await?;
    let profile = identity::current_profile(&state.db, &auth).await?;

    let deleted = messages::soft_delete(&state, scope, message_id, profile.id).await?;
    Ok(Json(json!({ "message": "Message deleted", "data": deleted })))
}

#[cfg(test)]
mod tests {
    use crate::test_support::Fixture;
    use axum::http::{Method, StatusCode};
    use huddle_common::gateway_event::{MessageEventKind, Topic};
    use huddle_common::models::MemberRole;
    use serde_json::json;

    #[tokio::test]
    async fn send_requires_server_and_channel_ids() {
        let f = Fixture::new().await;
        let body = Some(json!({ "content": "hi" }));

        let uri = format!("/api/socket/messages?channelId={}", f.general.id);
        let (status, _) = f.call(Method::POST, &uri, Some("owner"), body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/socket/messages?serverId={}", f.server.id);
        let (status, _) = f.call(Method::POST, &uri, Some("owner"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_publishes_and_history_returns_it() {
        let f = Fixture::new().await;
        let mut sub = f.state.hub.subscribe(Topic::from(f.general_scope()));

        let uri = format!(
            "/api/socket/messages?serverId={}&channelId={}",
            f.server.id, f.general.id
        );
        let (status, body) = f
            .call(Method::POST, &uri, Some("owner"), Some(json!({ "content": "hello" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Message sent");
        assert_eq!(body["data"]["content"], "hello");
        assert_eq!(body["data"]["author"]["profile"]["name"], "owner");

        let event = sub.try_recv().unwrap();
        assert_eq!(event.kind, MessageEventKind::Created);

        let history = format!("/api/messages?channelId={}&limit=5", f.general.id);
        let (status, page) = f.call(Method::GET, &history, Some("owner"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["messages"][0]["content"], "hello");
        assert!(page["nextCursor"].is_null());
    }

    #[tokio::test]
    async fn attachment_without_content_is_accepted() {
        let f = Fixture::new().await;
        let uri = format!(
            "/api/socket/messages?serverId={}&channelId={}",
            f.server.id, f.general.id
        );
        let (status, body) = f
            .call(
                Method::POST,
                &uri,
                Some("owner"),
                Some(json!({ "fileUrl": "https://files.example.com/a.pdf", "fileType": "application/pdf" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["content"].is_null());

        let (status, _) = f.call(Method::POST, &uri, Some("owner"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn file_url_without_file_type_is_rejected() {
        let f = Fixture::new().await;
        let uri = format!(
            "/api/socket/messages?serverId={}&channelId={}",
            f.server.id, f.general.id
        );
        let (status, body) = f
            .call(
                Method::POST,
                &uri,
                Some("owner"),
                Some(json!({ "content": "see file", "fileUrl": "https://files.example.com/a.pdf" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ARGUMENT");

        let (status, _) = f
            .call(
                Method::POST,
                &uri,
                Some("owner"),
                Some(json!({ "fileUrl": "https://files.example.com/a.pdf", "fileType": "  " })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let history = format!("/api/messages?channelId={}", f.general.id);
        let (_, page) = f.call(Method::GET, &history, Some("owner"), None).await;
        assert!(page["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_member_is_forbidden_and_delete_twice_conflicts() {
        let f = Fixture::new().await;
        f.join("mod", MemberRole::Moderator).await;
        let send = format!(
            "/api/socket/messages?serverId={}&channelId={}",
            f.server.id, f.general.id
        );

        let (status, _) = f
            .call(Method::POST, &send, Some("stranger"), Some(json!({ "content": "hi" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = f
            .call(Method::POST, &send, Some("owner"), Some(json!({ "content": "hi" })))
            .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!(
            "/api/socket/messages/{id}?serverId={}&channelId={}",
            f.server.id, f.general.id
        );

        let (status, _) = f
            .call(Method::PATCH, &uri, Some("mod"), Some(json!({ "content": "edited" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = f.call(Method::DELETE, &uri, Some("mod"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        let (status, _) = f.call(Method::DELETE, &uri, Some("mod"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
