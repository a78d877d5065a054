//! Message store operations.
//!
//! Every mutation runs gate, then durable write, then publish. Publishing is
//! fire-and-forget: a mutation that reached storage is reported as a success
//! even if nobody is listening.

use huddle_common::error::{HuddleError, HuddleResult};
use huddle_common::gateway_event::{MessageEvent, MessageEventKind};
use huddle_common::models::{
    Attachment, ChannelKind, Member, Message, MessagePage, MessageScope, MessageWithAuthor,
    PageCursor,
};
use huddle_common::permissions::{self, MessageAction};
use huddle_common::validation::{require_id, validate_edit_content, validate_message_body};
use huddle_db::repository::{channels, members, messages};
use uuid::Uuid;

use super::conversations;
use crate::AppState;

/// Content of a new message. At least one side must be present.
#[derive(Debug, Default, Clone)]
pub struct NewMessage {
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
}

/// The membership through which `profile_id` reads and writes `scope`.
///
/// A missing channel or conversation is `NotFound`; an existing one the
/// profile cannot see is `Unauthorized`.
pub async fn resolve_author(
    state: &AppState,
    scope: MessageScope,
    profile_id: Uuid,
) -> HuddleResult<Member> {
    match scope {
        MessageScope::Channel(channel_id) => {
            require_id(channel_id, "Channel ID")?;
            channels::find_by_id(&state.db.pool, channel_id)
                .await?
                .ok_or_else(|| HuddleError::not_found("Channel"))?;
            members::find_for_scope(&state.db.pool, scope, profile_id)
                .await?
                .ok_or(HuddleError::Unauthorized)
        }
        MessageScope::Conversation(conversation_id) => {
            let (_, member) =
                conversations::resolve_participant(&state.db, conversation_id, profile_id).await?;
            Ok(member)
        }
    }
}

/// Append a message to `scope` as `profile_id`'s membership.
pub async fn append(
    state: &AppState,
    scope: MessageScope,
    profile_id: Uuid,
    input: NewMessage,
) -> HuddleResult<MessageWithAuthor> {
    let content = validate_message_body(
        input.content.as_deref(),
        input.attachment.as_ref(),
        state.limits.max_message_length,
    )?;

    let author = resolve_author(state, scope, profile_id).await?;

    if let MessageScope::Channel(channel_id) = scope {
        let channel = channels::find_by_id(&state.db.pool, channel_id)
            .await?
            .ok_or_else(|| HuddleError::not_found("Channel"))?;
        if channel.kind != ChannelKind::Text {
            return Err(HuddleError::validation("Only text channels accept messages"));
        }
    }

    let message = messages::create(
        &state.db.pool,
        scope,
        author.id,
        content.as_deref(),
        input.attachment.as_ref(),
    )
    .await?;

    tracing::info!(message_id = %message.id, topic = %scope.id(), "Message created");
    let stored = load_with_author(state, message.id).await?;
    publish(state, MessageEventKind::Created, stored.clone());
    Ok(stored)
}

/// Replace the text of the requester's own message.
pub async fn edit(
    state: &AppState,
    scope: MessageScope,
    message_id: Uuid,
    profile_id: Uuid,
    new_content: Option<&str>,
) -> HuddleResult<MessageWithAuthor> {
    let content = validate_edit_content(new_content, state.limits.max_message_length)?;
    let (requester, message) = load_for_mutation(state, scope, message_id, profile_id).await?;

    if !permissions::can_mutate_message(&requester, &message, MessageAction::Edit) {
        return Err(HuddleError::Unauthorized);
    }
    if message.deleted {
        return Err(HuddleError::conflict("Message has been deleted"));
    }
    if message.attachment.is_some() {
        return Err(HuddleError::validation("Messages with attachments cannot be edited"));
    }

    // The update re-checks `deleted = 0`, so a delete that landed since the
    // read above still wins.
    let updated = match messages::update_content(&state.db.pool, message_id, &content).await? {
        Some(updated) => updated,
        None => return Err(explain_missed_update(state, message_id, MessageAction::Edit).await),
    };

    tracing::info!(message_id = %updated.id, "Message edited");
    let stored = load_with_author(state, updated.id).await?;
    publish(state, MessageEventKind::Updated, stored.clone());
    Ok(stored)
}

/// Soft-delete a message: author, or ADMIN/MODERATOR of the scope.
pub async fn soft_delete(
    state: &AppState,
    scope: MessageScope,
    message_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<MessageWithAuthor> {
    let (requester, message) = load_for_mutation(state, scope, message_id, profile_id).await?;

    if !permissions::can_mutate_message(&requester, &message, MessageAction::Delete) {
        return Err(HuddleError::Unauthorized);
    }
    if message.deleted {
        return Err(HuddleError::conflict("Message has already been deleted"));
    }

    let deleted = match messages::soft_delete(&state.db.pool, message_id).await? {
        Some(deleted) => deleted,
        None => return Err(explain_missed_update(state, message_id, MessageAction::Delete).await),
    };

    tracing::info!(message_id = %deleted.id, by = %requester.id, "Message deleted");
    let stored = load_with_author(state, deleted.id).await?;
    publish(state, MessageEventKind::Deleted, stored.clone());
    Ok(stored)
}

/// One page of `scope`, newest first. `cursor` is the opaque string from a
/// previous page's `next_cursor`.
pub async fn list_page(
    state: &AppState,
    scope: MessageScope,
    profile_id: Uuid,
    cursor: Option<&str>,
    page_size: Option<u32>,
) -> HuddleResult<MessagePage> {
    resolve_author(state, scope, profile_id).await?;

    let cursor = cursor
        .filter(|c| !c.is_empty())
        .map(|c| c.parse::<PageCursor>().map_err(HuddleError::validation))
        .transpose()?;
    let limit = page_size
        .unwrap_or(state.limits.default_page_size)
        .clamp(1, state.limits.max_page_size.max(1));

    let page = messages::list_page(&state.db.pool, scope, cursor, limit).await?;
    let next_cursor = if page.len() == limit as usize {
        page.last().map(|m| m.message.cursor().to_string())
    } else {
        None
    };

    Ok(MessagePage {
        messages: page,
        next_cursor,
    })
}

async fn load_for_mutation(
    state: &AppState,
    scope: MessageScope,
    message_id: Uuid,
    profile_id: Uuid,
) -> HuddleResult<(Member, Message)> {
    require_id(message_id, "Message ID")?;
    let requester = resolve_author(state, scope, profile_id).await?;
    let message = messages::find_by_id(&state.db.pool, message_id)
        .await?
        .filter(|m| m.scope == scope)
        .ok_or_else(|| HuddleError::not_found("Message"))?;
    Ok((requester, message))
}

async fn load_with_author(state: &AppState, message_id: Uuid) -> HuddleResult<MessageWithAuthor> {
    messages::find_with_author(&state.db.pool, message_id)
        .await?
        .ok_or_else(|| HuddleError::not_found("Message"))
}

/// Why a guarded `action` touched no row.
async fn explain_missed_update(
    state: &AppState,
    message_id: Uuid,
    action: MessageAction,
) -> HuddleError {
    match (messages::find_by_id(&state.db.pool, message_id).await, action) {
        (Ok(Some(m)), MessageAction::Edit) if m.deleted => {
            HuddleError::conflict("Message has been deleted")
        }
        (Ok(Some(m)), MessageAction::Delete) if m.deleted => {
            HuddleError::conflict("Message has already been deleted")
        }
        // Edits are also guarded on having no attachment
        (Ok(Some(_)), MessageAction::Edit) => {
            HuddleError::validation("Messages with attachments cannot be edited")
        }
        (Ok(Some(_)), MessageAction::Delete) => {
            HuddleError::conflict("Message changed while it was being deleted")
        }
        (Ok(None), _) => HuddleError::not_found("Message"),
        (Err(e), _) => e.into(),
    }
}

fn publish(state: &AppState, kind: MessageEventKind, message: MessageWithAuthor) {
    let event = MessageEvent::new(kind, message);
    let topic = event.topic.clone();
    let reached = state.hub.publish(event);
    tracing::debug!(topic = %topic, ?kind, reached, "Message event published");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Fixture};
    use huddle_common::gateway_event::Topic;
    use huddle_common::models::MemberRole;

    fn text(s: &str) -> NewMessage {
        NewMessage {
            content: Some(s.into()),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn append_then_page_returns_message_first() {
        let f = Fixture::new().await;
        let scope = f.general_scope();

        let msg = append(&f.state, scope, f.owner.id, text("hello")).await.unwrap();
        let page = list_page(&f.state, scope, f.owner.id, None, None).await.unwrap();

        assert_eq!(page.messages[0].message.id, msg.message.id);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn append_validates_body_and_access() {
        let f = Fixture::new().await;
        let scope = f.general_scope();

        assert!(matches!(
            append(&f.state, scope, f.owner.id, NewMessage::default()).await,
            Err(HuddleError::Validation { .. })
        ));
        assert!(matches!(
            append(&f.state, scope, f.owner.id, text("   ")).await,
            Err(HuddleError::Validation { .. })
        ));

        let stranger = test_support::profile(&f.state, "stranger").await;
        assert!(matches!(
            append(&f.state, scope, stranger.id, text("hi")).await,
            Err(HuddleError::Unauthorized)
        ));
        assert!(matches!(
            append(&f.state, MessageScope::Channel(Uuid::now_v7()), f.owner.id, text("hi")).await,
            Err(HuddleError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn audio_channels_reject_messages() {
        let f = Fixture::new().await;
        let voice = channels::create(
            &f.state.db.pool,
            f.server.id,
            f.owner.id,
            "voice",
            ChannelKind::Audio,
        )
        .await
        .unwrap();

        assert!(matches!(
            append(&f.state, MessageScope::Channel(voice.id), f.owner.id, text("hi")).await,
            Err(HuddleError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn moderator_delete_publishes_deleted_event() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let guest = f.join("guest", MemberRole::Guest).await;
        let moderator = f.join("mod", MemberRole::Moderator).await;

        let msg = append(&f.state, scope, guest.profile_id, text("oops")).await.unwrap();
        let mut viewer = f.state.hub.subscribe(Topic::from(scope));

        let deleted = soft_delete(&f.state, scope, msg.message.id, moderator.profile_id)
            .await
            .unwrap();
        assert!(deleted.message.deleted);
        assert!(deleted.message.content.is_none());

        let event = viewer.recv().await.unwrap();
        assert_eq!(event.kind, MessageEventKind::Deleted);
        assert_eq!(event.message.message.id, msg.message.id);

        // Second delete conflicts, and nothing more is published
        assert!(matches!(
            soft_delete(&f.state, scope, msg.message.id, moderator.profile_id).await,
            Err(HuddleError::Conflict { .. })
        ));
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn guest_cannot_delete_someone_elses_message() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let guest = f.join("guest", MemberRole::Guest).await;

        let msg = append(&f.state, scope, f.owner.id, text("admin says")).await.unwrap();
        assert!(matches!(
            soft_delete(&f.state, scope, msg.message.id, guest.profile_id).await,
            Err(HuddleError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn edit_publishes_update_and_loses_to_a_moderator_delete() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let moderator = f.join("mod", MemberRole::Moderator).await;

        let msg = append(&f.state, scope, f.owner.id, text("draft")).await.unwrap();
        let mut viewer = f.state.hub.subscribe(Topic::from(scope));

        assert!(matches!(
            edit(&f.state, scope, msg.message.id, moderator.profile_id, Some("hijack")).await,
            Err(HuddleError::Unauthorized)
        ));

        let edited = edit(&f.state, scope, msg.message.id, f.owner.id, Some("final"))
            .await
            .unwrap();
        assert!(edited.message.edited);
        assert_eq!(edited.message.content.as_deref(), Some("final"));

        let event = viewer.recv().await.unwrap();
        assert_eq!(event.kind, MessageEventKind::Updated);
        assert_eq!(event.message.message.id, msg.message.id);
        assert_eq!(event.message.message.content.as_deref(), Some("final"));

        soft_delete(&f.state, scope, msg.message.id, moderator.profile_id)
            .await
            .unwrap();
        let event = viewer.recv().await.unwrap();
        assert_eq!(event.kind, MessageEventKind::Deleted);

        // The author's later edit conflicts and publishes nothing
        assert!(matches!(
            edit(&f.state, scope, msg.message.id, f.owner.id, Some("again")).await,
            Err(HuddleError::Conflict { .. })
        ));
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn missed_guarded_writes_explain_themselves_per_action() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let live = append(&f.state, scope, f.owner.id, text("still here")).await.unwrap();
        let gone = append(&f.state, scope, f.owner.id, text("bye")).await.unwrap();
        soft_delete(&f.state, scope, gone.message.id, f.owner.id).await.unwrap();

        let err = explain_missed_update(&f.state, live.message.id, MessageAction::Delete).await;
        match err {
            HuddleError::Conflict { message } => assert!(!message.contains("attachment")),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(matches!(
            explain_missed_update(&f.state, live.message.id, MessageAction::Edit).await,
            HuddleError::Validation { .. }
        ));
        match explain_missed_update(&f.state, gone.message.id, MessageAction::Delete).await {
            HuddleError::Conflict { message } => assert_eq!(message, "Message has already been deleted"),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(matches!(
            explain_missed_update(&f.state, Uuid::now_v7(), MessageAction::Delete).await,
            HuddleError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn attachment_messages_cannot_be_edited() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let input = NewMessage {
            content: None,
            attachment: Some(Attachment {
                url: "https://files.example.com/cat.png".into(),
                content_type: "image/png".into(),
            }),
        };

        let msg = append(&f.state, scope, f.owner.id, input).await.unwrap();
        assert!(matches!(
            edit(&f.state, scope, msg.message.id, f.owner.id, Some("caption")).await,
            Err(HuddleError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn message_outside_scope_is_not_found() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        let other = channels::create(&f.state.db.pool, f.server.id, f.owner.id, "other", ChannelKind::Text)
            .await
            .unwrap();

        let msg = append(&f.state, scope, f.owner.id, text("here")).await.unwrap();
        assert!(matches!(
            soft_delete(&f.state, MessageScope::Channel(other.id), msg.message.id, f.owner.id).await,
            Err(HuddleError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn paging_with_concurrent_appends_has_no_duplicates_or_gaps() {
        let f = Fixture::new().await;
        let scope = f.general_scope();

        let mut originals = Vec::new();
        for i in 0..12 {
            let m = append(&f.state, scope, f.owner.id, text(&format!("m{i}"))).await.unwrap();
            originals.push(m.message.id);
        }
        originals.reverse();

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = list_page(&f.state, scope, f.owner.id, cursor.as_deref(), Some(5))
                .await
                .unwrap();
            seen.extend(page.messages.iter().map(|m| m.message.id));
            // New traffic between page fetches
            append(&f.state, scope, f.owner.id, text("late")).await.unwrap();
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let unique: std::collections::HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len());
        // The first page was taken before any "late" message existed
        assert_eq!(seen, originals);
    }

    #[tokio::test]
    async fn page_size_is_clamped_and_bad_cursor_rejected() {
        let f = Fixture::new().await;
        let scope = f.general_scope();
        for i in 0..3 {
            append(&f.state, scope, f.owner.id, text(&format!("m{i}"))).await.unwrap();
        }

        let page = list_page(&f.state, scope, f.owner.id, None, Some(0)).await.unwrap();
        assert_eq!(page.messages.len(), 1);
        assert!(page.next_cursor.is_some());

        assert!(matches!(
            list_page(&f.state, scope, f.owner.id, Some("garbage"), None).await,
            Err(HuddleError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn conversation_messages_are_private_to_participants() {
        let f = Fixture::new().await;
        let guest = f.join("guest", MemberRole::Guest).await;
        let bystander = f.join("bystander", MemberRole::Admin).await;
        let admin = f.owner_member().await;

        let conversation = conversations::get_or_create_conversation(&f.state.db, admin.id, guest.id)
            .await
            .unwrap();
        let scope = MessageScope::Conversation(conversation.id);

        let msg = append(&f.state, scope, guest.profile_id, text("psst")).await.unwrap();
        assert_eq!(msg.author.member.id, guest.id);

        assert!(matches!(
            list_page(&f.state, scope, bystander.profile_id, None, None).await,
            Err(HuddleError::Unauthorized)
        ));
        let page = list_page(&f.state, scope, f.owner.id, None, None).await.unwrap();
        assert_eq!(page.messages.len(), 1);
    }
}
