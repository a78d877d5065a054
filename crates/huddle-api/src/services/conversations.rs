//! Conversation resolution.
//!
//! Exactly one conversation exists per unordered pair of memberships. The
//! pair is normalized before touching storage, and the storage layer's unique
//! index settles concurrent first contact: the loser of the insert race reads
//! back the winner's row.

use huddle_common::error::{HuddleError, HuddleResult};
use huddle_common::models::{Conversation, Member, MemberPair, MemberWithProfile};
use huddle_common::validation::require_id;
use huddle_db::Database;
use huddle_db::repository::{conversations, members};
use uuid::Uuid;

use super::identity;

/// The conversation between memberships `a` and `b`, created on first use.
/// Argument order does not matter.
pub async fn get_or_create_conversation(
    db: &Database,
    a: Uuid,
    b: Uuid,
) -> HuddleResult<Conversation> {
    require_id(a, "Member ID")?;
    require_id(b, "Member ID")?;
    let pair = MemberPair::new(a, b)
        .ok_or_else(|| HuddleError::validation("Cannot start a conversation with yourself"))?;

    Ok(conversations::get_or_create(&db.pool, pair).await?)
}

/// A conversation opened from a server's member list.
#[derive(Debug)]
pub struct OpenedConversation {
    pub conversation: Conversation,
    pub me: Member,
    pub other: MemberWithProfile,
}

/// Open (or reopen) the conversation between the caller's membership in
/// `server_id` and `target_member_id`, which must belong to the same server.
pub async fn open_with_member(
    db: &Database,
    server_id: Uuid,
    profile_id: Uuid,
    target_member_id: Uuid,
) -> HuddleResult<OpenedConversation> {
    let me = identity::require_membership(db, server_id, profile_id).await?;

    require_id(target_member_id, "Member ID")?;
    let other = members::find_with_profile(&db.pool, target_member_id)
        .await?
        .filter(|m| m.member.server_id == server_id)
        .ok_or_else(|| HuddleError::not_found("Member"))?;

    let conversation = get_or_create_conversation(db, me.id, other.member.id).await?;
    Ok(OpenedConversation {
        conversation,
        me,
        other,
    })
}

/// A conversation and the caller's side of it. Non-participants are denied.
pub async fn resolve_participant(
    db: &Database,
    conversation_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<(Conversation, Member)> {
    require_id(conversation_id, "Conversation ID")?;
    let conversation = conversations::find_by_id(&db.pool, conversation_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Conversation"))?;

    for member_id in [conversation.member_one_id, conversation.member_two_id] {
        if let Some(member) = members::find_by_id(&db.pool, member_id).await? {
            if member.profile_id == profile_id {
                return Ok((conversation, member));
            }
        }
    }
    Err(HuddleError::Unauthorized)
}

/// Conversations the caller takes part in through their membership in
/// `server_id`.
pub async fn list_for_server(
    db: &Database,
    server_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<Vec<Conversation>> {
    let me = identity::require_membership(db, server_id, profile_id).await?;
    Ok(conversations::list_for_member(&db.pool, me.id).await?)
}
