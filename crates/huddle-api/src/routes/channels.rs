//! Channel routes: create, rename/retype and delete within a server.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{patch, post},
    Json, Router,
};
use huddle_common::{
    error::{HuddleError, HuddleResult},
    models::{Channel, CreateChannelRequest, Member, UpdateChannelRequest},
    permissions,
    validation::{validate_name, validate_request},
};
use huddle_db::repository::channels;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{required, ScopeQuery};
use crate::{middleware::AuthContext, services::identity, AppState};

/// Channel routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/channels", post(create_channel))
        .route(
            "/channels/{channel_id}",
            patch(update_channel).delete(delete_channel),
        )
}

/// Resolve the caller's membership in `?serverId=` and require a role that
/// may manage channels.
async fn channel_manager(
    state: &AppState,
    auth: &AuthContext,
    query: &ScopeQuery,
) -> HuddleResult<Member> {
    let server_id = required(query.server_id, "Server ID")?;
    let profile = identity::current_profile(&state.db, auth).await?;
    let member = identity::require_membership(&state.db, server_id, profile.id).await?;
    if !permissions::can_manage_channel(&member) {
        return Err(HuddleError::Unauthorized);
    }
    Ok(member)
}

async fn channel_in_server(state: &AppState, channel_id: Uuid, server_id: Uuid) -> HuddleResult<Channel> {
    channels::find_in_server(&state.db.pool, channel_id, server_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Channel"))
}

/// POST /api/channels?serverId=
async fn create_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<CreateChannelRequest>,
) -> HuddleResult<Json<Value>> {
    let member = channel_manager(&state, &auth, &query).await?;

    validate_request(&body)?;
    validate_name(&body.name)?;
    permissions::ensure_name_available(Some(&body.name))?;

    let count = channels::count_by_server(&state.db.pool, member.server_id).await?;
    if count >= i64::from(state.limits.max_channels_per_server) {
        return Err(HuddleError::validation(format!(
            "Servers are limited to {} channels",
            state.limits.max_channels_per_server
        )));
    }

    let channel = channels::create(
        &state.db.pool,
        member.server_id,
        member.profile_id,
        body.name.trim(),
        body.kind,
    )
    .await?;

    tracing::info!(
        channel_id = %channel.id,
        server_id = %member.server_id,
        name = %channel.name,
        "Channel created"
    );

    Ok(Json(json!({ "message": "Channel created", "channel": channel })))
}

/// PATCH /api/channels/:channel_id?serverId=
async fn update_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<UpdateChannelRequest>,
) -> HuddleResult<Json<Value>> {
    let member = channel_manager(&state, &auth, &query).await?;

    validate_request(&body)?;
    if let Some(name) = &body.name {
        validate_name(name)?;
    }

    let channel = channel_in_server(&state, channel_id, member.server_id).await?;
    permissions::ensure_channel_mutable(&channel, body.name.as_deref())?;

    let updated = channels::update(
        &state.db.pool,
        channel_id,
        body.name.as_deref().map(str::trim),
        body.kind,
    )
    .await?
    .ok_or_else(|| HuddleError::not_found("Channel"))?;

    Ok(Json(json!({ "message": "Channel updated", "channel": updated })))
}

/// DELETE /api/channels/:channel_id?serverId=
async fn delete_channel(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let member = channel_manager(&state, &auth, &query).await?;

    let channel = channel_in_server(&state, channel_id, member.server_id).await?;
    permissions::ensure_channel_mutable(&channel, None)?;

    channels::delete(&state.db.pool, channel_id).await?;
    tracing::info!(channel_id = %channel_id, by = %member.id, "Channel deleted");

    Ok(Json(json!({ "message": "Channel deleted", "channel": channel })))
}
