//! Channel repository: CRUD operations for server channels.

use huddle_common::models::{Channel, ChannelKind};
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::rows::decode_channel;

/// Create a new channel.
pub async fn create(
    pool: &SqlitePool,
    server_id: Uuid,
    profile_id: Uuid,
    name: &str,
    kind: ChannelKind,
) -> Result<Channel, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    sqlx::query(
        r#"
        INSERT INTO channels (id, server_id, name, kind, profile_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(server_id.to_string())
    .bind(name)
    .bind(kind.as_str())
    .bind(profile_id.to_string())
    .bind(&now)
    .bind(&now)
    .try_map(decode_channel)
    .fetch_one(pool)
    .await
}

/// Find a channel by ID.
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query("SELECT * FROM channels WHERE id = ?")
        .bind(id.to_string())
        .try_map(decode_channel)
        .fetch_optional(pool)
        .await
}

/// Find a channel only if it belongs to `server_id`.
pub async fn find_in_server(
    pool: &SqlitePool,
    id: Uuid,
    server_id: Uuid,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query("SELECT * FROM channels WHERE id = ? AND server_id = ?")
        .bind(id.to_string())
        .bind(server_id.to_string())
        .try_map(decode_channel)
        .fetch_optional(pool)
        .await
}

/// List all channels in a server, oldest first.
pub async fn list_by_server(
    pool: &SqlitePool,
    server_id: Uuid,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query("SELECT * FROM channels WHERE server_id = ? ORDER BY created_at, id")
        .bind(server_id.to_string())
        .try_map(decode_channel)
        .fetch_all(pool)
        .await
}

pub async fn count_by_server(pool: &SqlitePool, server_id: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM channels WHERE server_id = ?")
        .bind(server_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Rename or retype a channel. `None` leaves a field unchanged.
pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    kind: Option<ChannelKind>,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE channels SET
            name = COALESCE(?, name),
            kind = COALESCE(?, kind),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(kind.map(|k| k.as_str()))
    .bind(timestamp::encode(&timestamp::now()))
    .bind(id.to_string())
    .try_map(decode_channel)
    .fetch_optional(pool)
    .await
}

/// Delete a channel.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM channels WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use crate::repository::fixtures;
    use huddle_common::models::GENERAL_CHANNEL;

    #[tokio::test]
    async fn second_general_channel_is_rejected_by_storage() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;

        let err = create(&db.pool, server.id, admin.profile_id, GENERAL_CHANNEL, ChannelKind::Text)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn create_update_delete() {
        let db = fixtures::db().await;
        let (server, admin) = fixtures::server(&db).await;

        let chan = create(&db.pool, server.id, admin.profile_id, "voice", ChannelKind::Audio)
            .await
            .unwrap();
        assert_eq!(count_by_server(&db.pool, server.id).await.unwrap(), 2);

        let renamed = update(&db.pool, chan.id, Some("music"), None).await.unwrap().unwrap();
        assert_eq!(renamed.name, "music");
        assert_eq!(renamed.kind, ChannelKind::Audio);

        assert!(find_in_server(&db.pool, chan.id, Uuid::now_v7()).await.unwrap().is_none());
        assert!(delete(&db.pool, chan.id).await.unwrap());
        assert!(find_by_id(&db.pool, chan.id).await.unwrap().is_none());
    }
}
