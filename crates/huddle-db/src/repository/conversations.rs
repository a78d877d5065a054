//! Conversation repository: one row per unordered member pair.
//!
//! Rows are keyed by a [`MemberPair`], which is already in canonical order, so
//! `(a, b)` and `(b, a)` hit the same unique index entry.

use huddle_common::models::{Conversation, MemberPair};
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::is_unique_violation;
use crate::rows::decode_conversation;

pub async fn find_by_pair(
    pool: &SqlitePool,
    pair: MemberPair,
) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query("SELECT * FROM conversations WHERE member_one_id = ? AND member_two_id = ?")
        .bind(pair.first().to_string())
        .bind(pair.second().to_string())
        .try_map(decode_conversation)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query("SELECT * FROM conversations WHERE id = ?")
        .bind(id.to_string())
        .try_map(decode_conversation)
        .fetch_optional(pool)
        .await
}

/// Insert a conversation for `pair`. Fails with a unique violation if the
/// pair already has one.
pub async fn insert(pool: &SqlitePool, pair: MemberPair) -> Result<Conversation, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, member_one_id, member_two_id, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(pair.first().to_string())
    .bind(pair.second().to_string())
    .bind(timestamp::encode(&timestamp::now()))
    .try_map(decode_conversation)
    .fetch_one(pool)
    .await
}

/// Insert, and if a concurrent writer won the race, return the winner's row.
pub async fn insert_or_fetch(
    pool: &SqlitePool,
    pair: MemberPair,
) -> Result<Conversation, sqlx::Error> {
    match insert(pool, pair).await {
        Ok(conversation) => Ok(conversation),
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(
                member_one = %pair.first(),
                member_two = %pair.second(),
                "Conversation created concurrently, using existing row"
            );
            find_by_pair(pool, pair)
                .await?
                .ok_or(sqlx::Error::RowNotFound)
        }
        Err(e) => Err(e),
    }
}

/// The single conversation for `pair`, created on first contact.
pub async fn get_or_create(
    pool: &SqlitePool,
    pair: MemberPair,
) -> Result<Conversation, sqlx::Error> {
    if let Some(existing) = find_by_pair(pool, pair).await? {
        return Ok(existing);
    }
    insert_or_fetch(pool, pair).await
}

/// Conversations `member_id` takes part in, newest first.
pub async fn list_for_member(
    pool: &SqlitePool,
    member_id: Uuid,
) -> Result<Vec<Conversation>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT * FROM conversations
        WHERE member_one_id = ? OR member_two_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(member_id.to_string())
    .bind(member_id.to_string())
    .try_map(decode_conversation)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use huddle_common::models::MemberRole;

    #[tokio::test]
    async fn get_or_create_is_order_independent() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let guest = fixtures::member(&db, &server, MemberRole::Guest).await;

        let ab = get_or_create(&db.pool, MemberPair::new(admin.id, guest.id).unwrap())
            .await
            .unwrap();
        let ba = get_or_create(&db.pool, MemberPair::new(guest.id, admin.id).unwrap())
            .await
            .unwrap();

        assert_eq!(ab.id, ba.id);
        assert!(ab.member_one_id < ab.member_two_id);
        assert_eq!(list_for_member(&db.pool, guest.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn losing_insert_recovers_existing_row() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;
        let guest = fixtures::member(&db, &server, MemberRole::Guest).await;
        let pair = MemberPair::new(admin.id, guest.id).unwrap();

        let winner = insert(&db.pool, pair).await.unwrap();
        assert!(is_unique_violation(&insert(&db.pool, pair).await.unwrap_err()));

        let recovered = insert_or_fetch(&db.pool, pair).await.unwrap();
        assert_eq!(recovered.id, winner.id);
    }
}
