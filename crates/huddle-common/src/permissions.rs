//! Mutation authorization gate.
//!
//! Pure predicates over already-loaded data. Nothing here touches storage or
//! the network; callers resolve the requester's membership first and map a
//! `false` to [`HuddleError::Unauthorized`].
//!
//! Role ladder: `GUEST < MODERATOR < ADMIN`. The server owner is tracked on
//! the server itself and is always an ADMIN member.

use crate::error::{HuddleError, HuddleResult};
use crate::models::{Channel, GENERAL_CHANNEL, Member, MemberRole, Message, Server};

/// Mutations a member can attempt on an existing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    Edit,
    Delete,
}

/// Only the author may edit their message.
pub fn can_edit_message(requester: &Member, message: &Message) -> bool {
    requester.id == message.author_id
}

/// The author may delete their message; ADMIN and MODERATOR may delete anyone's.
pub fn can_delete_message(requester: &Member, message: &Message) -> bool {
    requester.id == message.author_id || requester.role.is_moderation_capable()
}

pub fn can_mutate_message(requester: &Member, message: &Message, action: MessageAction) -> bool {
    match action {
        MessageAction::Edit => can_edit_message(requester, message),
        MessageAction::Delete => can_delete_message(requester, message),
    }
}

/// Creating, renaming, retyping and deleting channels.
pub fn can_manage_channel(requester: &Member) -> bool {
    requester.role.is_moderation_capable()
}

/// `general` can be neither renamed nor deleted.
pub fn channel_is_protected(channel: &Channel) -> bool {
    channel.is_general()
}

/// Reject any change that would touch the protected channel or claim its name.
///
/// `new_name` is the requested name for a rename, `None` for a delete or a
/// type-only change.
pub fn ensure_channel_mutable(channel: &Channel, new_name: Option<&str>) -> HuddleResult<()> {
    if channel_is_protected(channel) {
        return Err(HuddleError::validation(format!(
            "The '{GENERAL_CHANNEL}' channel cannot be modified"
        )));
    }
    ensure_name_available(new_name)
}

/// No channel other than the one created with the server may be called `general`.
pub fn ensure_name_available(name: Option<&str>) -> HuddleResult<()> {
    match name {
        Some(n) if n.trim().eq_ignore_ascii_case(GENERAL_CHANNEL) => Err(HuddleError::validation(
            format!("Channel name cannot be '{GENERAL_CHANNEL}'"),
        )),
        _ => Ok(()),
    }
}

/// Whether `requester` may change `target`'s role or remove them.
///
/// Moderation-capable roles only, and only over strictly lower roles, so two
/// admins cannot demote or kick each other. Acting on oneself is an invalid
/// request rather than a denial.
pub fn can_manage_member(requester: &Member, target: &Member) -> HuddleResult<bool> {
    if requester.id == target.id || requester.profile_id == target.profile_id {
        return Err(HuddleError::validation("Cannot manage your own membership"));
    }
    if requester.server_id != target.server_id {
        return Ok(false);
    }
    Ok(requester.role.is_moderation_capable() && requester.role > target.role)
}

/// A requester can never grant a role above their own.
pub fn can_assign_role(requester: &Member, new_role: MemberRole) -> bool {
    requester.role.is_moderation_capable() && new_role <= requester.role
}

/// Rename, re-image, delete and invite regeneration belong to the owner.
pub fn can_manage_server(profile_id: uuid::Uuid, server: &Server) -> bool {
    server.owner_id == profile_id
}
