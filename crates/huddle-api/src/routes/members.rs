//! Member management: role changes and kicks.

use axum::{
    extract::{Extension, Path, Query, State},
    routing::patch,
    Json, Router,
};
use huddle_common::{
    error::{HuddleError, HuddleResult},
    models::{Member, UpdateMemberRequest},
    permissions,
};
use huddle_db::repository::members;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{required, ScopeQuery};
use crate::{middleware::AuthContext, services::identity, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/members/{member_id}",
        patch(update_member_role).delete(kick_member),
    )
}

/// The caller's membership and the target's, after checking the caller may
/// act on the target.
async fn requester_and_target(
    state: &AppState,
    auth: &AuthContext,
    query: &ScopeQuery,
    member_id: Uuid,
) -> HuddleResult<(Member, Member)> {
    let server_id = required(query.server_id, "Server ID")?;
    let profile = identity::current_profile(&state.db, auth).await?;
    let requester = identity::require_membership(&state.db, server_id, profile.id).await?;

    let target = members::find_by_id(&state.db.pool, member_id)
        .await?
        .filter(|m| m.server_id == server_id)
        .ok_or_else(|| HuddleError::not_found("Member"))?;

    if !permissions::can_manage_member(&requester, &target)? {
        return Err(HuddleError::Unauthorized);
    }
    Ok((requester, target))
}

/// PATCH /api/members/:member_id?serverId=
async fn update_member_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
    Json(body): Json<UpdateMemberRequest>,
) -> HuddleResult<Json<Value>> {
    let (requester, target) = requester_and_target(&state, &auth, &query, member_id).await?;
    if !permissions::can_assign_role(&requester, body.role) {
        return Err(HuddleError::Unauthorized);
    }

    let updated = members::update_role(&state.db.pool, target.id, body.role)
        .await?
        .ok_or_else(|| HuddleError::not_found("Member"))?;

    tracing::info!(
        member_id = %target.id,
        role = body.role.as_str(),
        by = %requester.id,
        "Member role changed"
    );

    let member = members::find_with_profile(&state.db.pool, updated.id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Member"))?;
    Ok(Json(json!({ "message": "Member updated", "member": member })))
}

/// DELETE /api/members/:member_id?serverId=
async fn kick_member(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
) -> HuddleResult<Json<Value>> {
    let (requester, target) = requester_and_target(&state, &auth, &query, member_id).await?;

    members::remove(&state.db.pool, target.id).await?;
    tracing::info!(member_id = %target.id, by = %requester.id, "Member kicked");

    Ok(Json(json!({ "message": "Member removed", "member": target })))
}
