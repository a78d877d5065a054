//! Server repository: CRUD operations for servers.

use huddle_common::models::{ChannelKind, GENERAL_CHANNEL, MemberRole, Server};
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::rows::decode_server;

/// Create a server together with its `general` text channel and the
/// creator's ADMIN membership, in one transaction.
pub async fn create_with_defaults(
    pool: &SqlitePool,
    owner_id: Uuid,
    name: &str,
    image_url: Option<&str>,
) -> Result<Server, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    let server_id = snowflake::generate_id();
    let mut tx = pool.begin().await?;

    let server = sqlx::query(
        r#"
        INSERT INTO servers (id, name, image_url, invite_code, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(server_id.to_string())
    .bind(name)
    .bind(image_url)
    .bind(snowflake::generate_invite_code())
    .bind(owner_id.to_string())
    .bind(&now)
    .bind(&now)
    .try_map(decode_server)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO channels (id, server_id, name, kind, profile_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(server_id.to_string())
    .bind(GENERAL_CHANNEL)
    .bind(ChannelKind::Text.as_str())
    .bind(owner_id.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO members (id, server_id, profile_id, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(server_id.to_string())
    .bind(owner_id.to_string())
    .bind(MemberRole::Admin.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(server)
}

/// Find a server by ID.
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Server>, sqlx::Error> {
    sqlx::query("SELECT * FROM servers WHERE id = ?")
        .bind(id.to_string())
        .try_map(decode_server)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_invite_code(
    pool: &SqlitePool,
    invite_code: &str,
) -> Result<Option<Server>, sqlx::Error> {
    sqlx::query("SELECT * FROM servers WHERE invite_code = ?")
        .bind(invite_code)
        .try_map(decode_server)
        .fetch_optional(pool)
        .await
}

/// List servers a profile is a member of.
pub async fn list_for_profile(
    pool: &SqlitePool,
    profile_id: Uuid,
) -> Result<Vec<Server>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT s.* FROM servers s
        INNER JOIN members m ON m.server_id = s.id
        WHERE m.profile_id = ? AND m.left_at IS NULL
        ORDER BY s.created_at
        "#,
    )
    .bind(profile_id.to_string())
    .try_map(decode_server)
    .fetch_all(pool)
    .await
}

/// Update server details. `None` leaves a field unchanged.
pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    image_url: Option<&str>,
) -> Result<Option<Server>, sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE servers SET
            name = COALESCE(?, name),
            image_url = COALESCE(?, image_url),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(image_url)
    .bind(timestamp::encode(&timestamp::now()))
    .bind(id.to_string())
    .try_map(decode_server)
    .fetch_optional(pool)
    .await
}

/// Replace the invite code; the old one stops working immediately.
pub async fn regenerate_invite_code(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<Option<Server>, sqlx::Error> {
    sqlx::query("UPDATE servers SET invite_code = ?, updated_at = ? WHERE id = ? RETURNING *")
        .bind(snowflake::generate_invite_code())
        .bind(timestamp::encode(&timestamp::now()))
        .bind(id.to_string())
        .try_map(decode_server)
        .fetch_optional(pool)
        .await
}

/// Delete a server and all associated data.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    // Cascading deletes handled by foreign keys
    let result = sqlx::query("DELETE FROM servers WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
