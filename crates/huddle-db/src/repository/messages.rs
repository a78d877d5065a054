//! Message repository: append, edit, soft delete, keyset pages.
//!
//! Pagination walks `(created_at, id)` strictly downward from the cursor, so
//! rows appended while a reader is paging sort above the cursor and never
//! shift or duplicate later pages. Edits and deletes re-check `deleted = 0` in
//! the same statement that writes, which makes "edit after delete" and
//! "double delete" lose cleanly instead of racing.

use huddle_common::models::{Attachment, Message, MessageScope, MessageWithAuthor, PageCursor};
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::rows::{decode_message, decode_message_with_author};

const WITH_AUTHOR: &str = r#"
    SELECT msg.*,
           a.id AS a_id, a.server_id AS a_server_id, a.profile_id AS a_profile_id,
           a.role AS a_role, a.created_at AS a_created_at, a.updated_at AS a_updated_at,
           p.name AS p_name, p.image_url AS p_image_url
    FROM messages msg
    INNER JOIN members a ON a.id = msg.author_id
    INNER JOIN profiles p ON p.id = a.profile_id
"#;

fn scope_column(scope: &MessageScope) -> &'static str {
    match scope {
        MessageScope::Channel(_) => "channel_id",
        MessageScope::Conversation(_) => "conversation_id",
    }
}

/// Append a message.
pub async fn create(
    pool: &SqlitePool,
    scope: MessageScope,
    author_id: Uuid,
    content: Option<&str>,
    attachment: Option<&Attachment>,
) -> Result<Message, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    let (channel_id, conversation_id) = match scope {
        MessageScope::Channel(id) => (Some(id.to_string()), None),
        MessageScope::Conversation(id) => (None, Some(id.to_string())),
    };

    sqlx::query(
        r#"
        INSERT INTO messages (
            id, channel_id, conversation_id, author_id, content,
            attachment_url, attachment_type, deleted, edited, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(channel_id)
    .bind(conversation_id)
    .bind(author_id.to_string())
    .bind(content)
    .bind(attachment.map(|a| a.url.as_str()))
    .bind(attachment.map(|a| a.content_type.as_str()))
    .bind(&now)
    .bind(&now)
    .try_map(decode_message)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query("SELECT * FROM messages WHERE id = ?")
        .bind(id.to_string())
        .try_map(decode_message)
        .fetch_optional(pool)
        .await
}

pub async fn find_with_author(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<Option<MessageWithAuthor>, sqlx::Error> {
    sqlx::query(&format!("{WITH_AUTHOR} WHERE msg.id = ?"))
        .bind(id.to_string())
        .try_map(decode_message_with_author)
        .fetch_optional(pool)
        .await
}

/// Replace the text of a live, text-only message and mark it edited.
///
/// Returns `None` when nothing was updated: the message is missing, deleted,
/// or carries an attachment. Callers distinguish with [`find_by_id`].
pub async fn update_content(
    pool: &SqlitePool,
    id: Uuid,
    content: &str,
) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages SET content = ?, edited = 1, updated_at = ?
        WHERE id = ? AND deleted = 0 AND attachment_url IS NULL
        RETURNING *
        "#,
    )
    .bind(content)
    .bind(timestamp::encode(&timestamp::now()))
    .bind(id.to_string())
    .try_map(decode_message)
    .fetch_optional(pool)
    .await
}

/// Clear content and attachment and flag the message deleted.
///
/// Returns `None` when the message is missing or already deleted.
pub async fn soft_delete(pool: &SqlitePool, id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages SET
            content = NULL, attachment_url = NULL, attachment_type = NULL,
            deleted = 1, updated_at = ?
        WHERE id = ? AND deleted = 0
        RETURNING *
        "#,
    )
    .bind(timestamp::encode(&timestamp::now()))
    .bind(id.to_string())
    .try_map(decode_message)
    .fetch_optional(pool)
    .await
}

/// Up to `limit` messages of `scope`, newest first, strictly older than
/// `cursor` when one is given.
pub async fn list_page(
    pool: &SqlitePool,
    scope: MessageScope,
    cursor: Option<PageCursor>,
    limit: u32,
) -> Result<Vec<MessageWithAuthor>, sqlx::Error> {
    let column = scope_column(&scope);
    let scope_id = scope.id().to_string();

    match cursor {
        None => {
            sqlx::query(&format!(
                r#"{WITH_AUTHOR}
                WHERE msg.{column} = ?
                ORDER BY msg.created_at DESC, msg.id DESC
                LIMIT ?
                "#
            ))
            .bind(scope_id)
            .bind(i64::from(limit))
            .try_map(decode_message_with_author)
            .fetch_all(pool)
            .await
        }
        Some(cursor) => {
            let ts = timestamp::encode(&cursor.created_at);
            sqlx::query(&format!(
                r#"{WITH_AUTHOR}
                WHERE msg.{column} = ?
                  AND (msg.created_at < ? OR (msg.created_at = ? AND msg.id < ?))
                ORDER BY msg.created_at DESC, msg.id DESC
                LIMIT ?
                "#
            ))
            .bind(scope_id)
            .bind(&ts)
            .bind(&ts)
            .bind(cursor.id.to_string())
            .bind(i64::from(limit))
            .try_map(decode_message_with_author)
            .fetch_all(pool)
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{channels, conversations, fixtures};
    use huddle_common::models::{MemberPair, MemberRole};
    use std::collections::HashSet;

    async fn general_scope(db: &crate::Database, server_id: Uuid) -> MessageScope {
        let chans = channels::list_by_server(&db.pool, server_id).await.unwrap();
        MessageScope::Channel(chans[0].id)
    }

    #[tokio::test]
    async fn pages_walk_newest_first_without_gaps() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let scope = general_scope(&db, server.id).await;

        let mut ids = Vec::new();
        for i in 0..25 {
            let m = create(&db.pool, scope, admin.id, Some(&format!("m{i}")), None)
                .await
                .unwrap();
            ids.push(m.id);
        }
        ids.reverse();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = list_page(&db.pool, scope, cursor, 10).await.unwrap();
            seen.extend(page.iter().map(|m| m.message.id));
            if page.len() < 10 {
                break;
            }
            cursor = page.last().map(|m| m.message.cursor());
        }
        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn appends_during_paging_do_not_shift_pages() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let scope = general_scope(&db, server.id).await;

        for i in 0..6 {
            create(&db.pool, scope, admin.id, Some(&format!("old{i}")), None)
                .await
                .unwrap();
        }

        let first = list_page(&db.pool, scope, None, 3).await.unwrap();
        for i in 0..5 {
            create(&db.pool, scope, admin.id, Some(&format!("new{i}")), None)
                .await
                .unwrap();
        }
        let second = list_page(&db.pool, scope, first.last().map(|m| m.message.cursor()), 3)
            .await
            .unwrap();

        let first_ids: HashSet<Uuid> = first.iter().map(|m| m.message.id).collect();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|m| !first_ids.contains(&m.message.id)));
        assert!(
            second
                .iter()
                .all(|m| m.message.content.as_deref().unwrap().starts_with("old"))
        );
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let guest = fixtures::member(&db, &server, MemberRole::Guest).await;
        let conversation = conversations::get_or_create(
            &db.pool,
            MemberPair::new(admin.id, guest.id).unwrap(),
        )
        .await
        .unwrap();

        let channel_scope = general_scope(&db, server.id).await;
        let dm_scope = MessageScope::Conversation(conversation.id);
        create(&db.pool, channel_scope, admin.id, Some("public"), None).await.unwrap();
        create(&db.pool, dm_scope, guest.id, Some("private"), None).await.unwrap();

        let dm_page = list_page(&db.pool, dm_scope, None, 10).await.unwrap();
        assert_eq!(dm_page.len(), 1);
        assert_eq!(dm_page[0].message.scope, dm_scope);
        assert_eq!(dm_page[0].author.member.id, guest.id);
    }

    #[tokio::test]
    async fn edit_and_delete_only_touch_live_messages() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let scope = general_scope(&db, server.id).await;
        let msg = create(&db.pool, scope, admin.id, Some("hello"), None).await.unwrap();

        let edited = update_content(&db.pool, msg.id, "hello!").await.unwrap().unwrap();
        assert!(edited.edited);
        assert_eq!(edited.content.as_deref(), Some("hello!"));

        let deleted = soft_delete(&db.pool, msg.id).await.unwrap().unwrap();
        assert!(deleted.deleted);
        assert!(deleted.content.is_none());

        assert!(soft_delete(&db.pool, msg.id).await.unwrap().is_none());
        assert!(update_content(&db.pool, msg.id, "again").await.unwrap().is_none());
        assert!(find_by_id(&db.pool, msg.id).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn attachment_messages_are_not_editable() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let scope = general_scope(&db, server.id).await;
        let attachment = Attachment {
            url: "https://files.example.com/a.pdf".into(),
            content_type: "application/pdf".into(),
        };
        let msg = create(&db.pool, scope, admin.id, None, Some(&attachment))
            .await
            .unwrap();
        assert_eq!(msg.attachment.as_ref(), Some(&attachment));

        assert!(update_content(&db.pool, msg.id, "caption").await.unwrap().is_none());

        let deleted = soft_delete(&db.pool, msg.id).await.unwrap().unwrap();
        assert!(deleted.attachment.is_none());
    }
}
