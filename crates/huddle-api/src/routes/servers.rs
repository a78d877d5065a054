//! Server routes: create, manage, join by invite, leave.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use huddle_common::{
    error::{HuddleError, HuddleResult},
    models::{CreateServerRequest, Server, UpdateServerRequest},
    permissions,
    validation::{validate_name, validate_request},
};
use huddle_db::repository::servers;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, services::identity, AppState};

/// Server routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/servers", get(list_my_servers).post(create_server))
        .route(
            "/servers/{server_id}",
            patch(update_server).delete(delete_server),
        )
        .route("/servers/{server_id}/invite-code", patch(regenerate_invite))
        .route("/servers/{server_id}/leave", patch(leave_server))
        .route("/servers/{server_id}/members", get(list_members))
        .route("/invites/{invite_code}", post(join_via_invite))
}

/// GET /api/servers: servers the caller is a member of.
async fn list_my_servers(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let list = servers::list_for_profile(&state.db.pool, profile.id).await?;
    Ok(Json(json!({ "message": "Servers fetched", "servers": list })))
}

/// POST /api/servers: create a server, its `general` channel and the
/// creator's ADMIN membership.
async fn create_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateServerRequest>,
) -> HuddleResult<Json<Value>> {
    validate_request(&body)?;
    validate_name(&body.name)?;

    let profile = identity::current_profile(&state.db, &auth).await?;
    let server = servers::create_with_defaults(
        &state.db.pool,
        profile.id,
        body.name.trim(),
        body.image_url.as_deref(),
    )
    .await?;

    tracing::info!(server_id = %server.id, owner_id = %profile.id, "Server created");
    Ok(Json(json!({ "message": "Server created", "server": server })))
}

/// Load a server and require the caller to own it.
async fn owned_server(
    state: &AppState,
    auth: &AuthContext,
    server_id: Uuid,
) -> HuddleResult<Server> {
    let profile = identity::current_profile(&state.db, auth).await?;
    let server = identity::find_server(&state.db, server_id).await?;
    if !permissions::can_manage_server(profile.id, &server) {
        return Err(HuddleError::Unauthorized);
    }
    Ok(server)
}

/// PATCH /api/servers/:server_id
async fn update_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
    Json(body): Json<UpdateServerRequest>,
) -> HuddleResult<Json<Value>> {
    validate_request(&body)?;
    if let Some(name) = &body.name {
        validate_name(name)?;
    }
    owned_server(&state, &auth, server_id).await?;

    let server = servers::update(
        &state.db.pool,
        server_id,
        body.name.as_deref().map(str::trim),
        body.image_url.as_deref(),
    )
    .await?
    .ok_or_else(|| HuddleError::not_found("Server"))?;

    Ok(Json(json!({ "message": "Server updated", "server": server })))
}

/// DELETE /api/servers/:server_id: cascades to channels, members,
/// conversations and messages.
async fn delete_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> HuddleResult<Json<Value>> {
    let server = owned_server(&state, &auth, server_id).await?;
    servers::delete(&state.db.pool, server_id).await?;

    tracing::info!(server_id = %server_id, "Server deleted");
    Ok(Json(json!({ "message": "Server deleted", "server": server })))
}

/// PATCH /api/servers/:server_id/invite-code
async fn regenerate_invite(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> HuddleResult<Json<Value>> {
    owned_server(&state, &auth, server_id).await?;
    let server = servers::regenerate_invite_code(&state.db.pool, server_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Server"))?;

    tracing::info!(server_id = %server_id, "Invite code regenerated");
    Ok(Json(json!({ "message": "Invite code regenerated", "server": server })))
}

/// PATCH /api/servers/:server_id/leave
async fn leave_server(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let server = identity::leave_server(&state.db, server_id, &profile).await?;
    Ok(Json(json!({ "message": "Left server", "server": server })))
}

/// GET /api/servers/:server_id/members
async fn list_members(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let members = identity::list_members(&state.db, server_id, profile.id).await?;
    Ok(Json(json!({ "message": "Members fetched", "members": members })))
}

/// POST /api/invites/:invite_code: join as GUEST. Repeat joins are no-ops.
async fn join_via_invite(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(invite_code): Path<String>,
) -> HuddleResult<Json<Value>> {
    let profile = identity::current_profile(&state.db, &auth).await?;
    let (server, member) = identity::join_by_invite(&state.db, &invite_code, &profile).await?;
    Ok(Json(json!({ "message": "Joined server", "server": server, "member": member })))
}
