//! Identity and membership resolution.
//!
//! The auth provider owns identities; `current_profile` mirrors the token's
//! identity into a local profile. Membership is what every server, channel
//! and message operation is authorized against.

use huddle_common::error::{HuddleError, HuddleResult};
use huddle_common::models::{Member, MemberRole, MemberWithProfile, Profile, Server};
use huddle_common::validation::require_id;
use huddle_db::Database;
use huddle_db::repository::{members, profiles, servers};
use uuid::Uuid;

use crate::middleware::AuthContext;

/// The local profile for the authenticated identity, created on first use.
pub async fn current_profile(db: &Database, auth: &AuthContext) -> HuddleResult<Profile> {
    let profile = profiles::upsert(
        &db.pool,
        &auth.subject,
        &auth.name,
        auth.image_url.as_deref(),
        auth.email.as_deref(),
    )
    .await?;
    Ok(profile)
}

/// The membership of `profile_id` in `server_id`, or `NotFound`.
pub async fn resolve_membership(
    db: &Database,
    server_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<Member> {
    require_id(server_id, "Server ID")?;
    require_id(profile_id, "Profile ID")?;

    members::find(&db.pool, server_id, profile_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Member"))
}

/// Like [`resolve_membership`], but a missing membership is an access denial.
pub async fn require_membership(
    db: &Database,
    server_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<Member> {
    match resolve_membership(db, server_id, profile_id).await {
        Err(HuddleError::NotFound { .. }) => Err(HuddleError::Unauthorized),
        other => other,
    }
}

pub async fn find_server(db: &Database, server_id: Uuid) -> HuddleResult<Server> {
    require_id(server_id, "Server ID")?;
    servers::find_by_id(&db.pool, server_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Server"))
}

/// Join the server behind `invite_code` as a GUEST. Joining twice returns
/// the existing membership.
pub async fn join_by_invite(
    db: &Database,
    invite_code: &str,
    profile: &Profile,
) -> HuddleResult<(Server, Member)> {
    if invite_code.trim().is_empty() {
        return Err(HuddleError::validation("Invite code missing"));
    }
    let server = servers::find_by_invite_code(&db.pool, invite_code)
        .await?
        .ok_or_else(|| HuddleError::not_found("Invite"))?;

    let (member, created) =
        members::add_if_absent(&db.pool, server.id, profile.id, MemberRole::Guest).await?;
    if created {
        tracing::info!(server_id = %server.id, profile_id = %profile.id, "Member joined via invite");
    }
    Ok((server, member))
}

/// Remove the caller's own membership. The owner has to delete the server
/// instead.
pub async fn leave_server(db: &Database, server_id: Uuid, profile: &Profile) -> HuddleResult<Server> {
    let server = find_server(db, server_id).await?;
    if server.owner_id == profile.id {
        return Err(HuddleError::validation("The server owner cannot leave the server"));
    }

    let member = require_membership(db, server_id, profile.id).await?;
    members::remove(&db.pool, member.id).await?;
    tracing::info!(server_id = %server_id, profile_id = %profile.id, "Member left server");
    Ok(server)
}

/// Members ordered ADMIN, MODERATOR, GUEST. Only visible to members.
pub async fn list_members(
    db: &Database,
    server_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<Vec<MemberWithProfile>> {
    require_membership(db, server_id, profile_id).await?;
    Ok(members::list_with_profiles(&db.pool, server_id).await?)
}
