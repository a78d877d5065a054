//! Member repository: server membership management.

use huddle_common::models::{Member, MemberRole, MemberWithProfile, MessageScope};
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::rows::{decode_member, decode_member_with_profile};

const WITH_PROFILE: &str = r#"
    SELECT m.*, p.name AS p_name, p.image_url AS p_image_url
    FROM members m
    INNER JOIN profiles p ON p.id = m.profile_id
"#;

// Departed members keep their row (see `remove`); every lookup that grants
// access or lists the roster filters on this.
const LIVE: &str = "left_at IS NULL";

/// Add a profile as a member of a server. Fails with a unique violation if
/// the membership already exists.
pub async fn add(
    pool: &SqlitePool,
    server_id: Uuid,
    profile_id: Uuid,
    role: MemberRole,
) -> Result<Member, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    sqlx::query(
        r#"
        INSERT INTO members (id, server_id, profile_id, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(server_id.to_string())
    .bind(profile_id.to_string())
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .try_map(decode_member)
    .fetch_one(pool)
    .await
}

/// Add a membership unless a live one exists; either way return the stored
/// row. A departed member is brought back with `role` and keeps their id, so
/// their earlier messages and conversations reattach. The boolean is `true`
/// when this call created or revived the membership.
pub async fn add_if_absent(
    pool: &SqlitePool,
    server_id: Uuid,
    profile_id: Uuid,
    role: MemberRole,
) -> Result<(Member, bool), sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    let inserted = sqlx::query(
        r#"
        INSERT INTO members (id, server_id, profile_id, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (server_id, profile_id) DO UPDATE SET
            role = excluded.role,
            left_at = NULL,
            updated_at = excluded.updated_at
        WHERE members.left_at IS NOT NULL
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(server_id.to_string())
    .bind(profile_id.to_string())
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?
    .rows_affected()
        > 0;

    let member = find(pool, server_id, profile_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((member, inserted))
}

/// Get the membership of `profile_id` in `server_id`.
pub async fn find(
    pool: &SqlitePool,
    server_id: Uuid,
    profile_id: Uuid,
) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT * FROM members WHERE server_id = ? AND profile_id = ? AND {LIVE}"
    ))
        .bind(server_id.to_string())
        .bind(profile_id.to_string())
        .try_map(decode_member)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query(&format!("SELECT * FROM members WHERE id = ? AND {LIVE}"))
        .bind(id.to_string())
        .try_map(decode_member)
        .fetch_optional(pool)
        .await
}

pub async fn find_with_profile(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<Option<MemberWithProfile>, sqlx::Error> {
    sqlx::query(&format!("{WITH_PROFILE} WHERE m.id = ? AND m.{LIVE}"))
        .bind(id.to_string())
        .try_map(decode_member_with_profile)
        .fetch_optional(pool)
        .await
}

/// Members of a server, ADMIN first, then MODERATOR, then GUEST; oldest
/// membership first within a role.
pub async fn list_with_profiles(
    pool: &SqlitePool,
    server_id: Uuid,
) -> Result<Vec<MemberWithProfile>, sqlx::Error> {
    sqlx::query(&format!(
        r#"{WITH_PROFILE}
        WHERE m.server_id = ? AND m.{LIVE}
        ORDER BY CASE m.role WHEN 'ADMIN' THEN 0 WHEN 'MODERATOR' THEN 1 ELSE 2 END,
                 m.created_at, m.id
        "#
    ))
    .bind(server_id.to_string())
    .try_map(decode_member_with_profile)
    .fetch_all(pool)
    .await
}

/// The membership through which `profile_id` can read and write `scope`:
/// a membership of the channel's server, or the profile's side of the
/// conversation. `None` when the profile has no access or the scope is gone.
pub async fn find_for_scope(
    pool: &SqlitePool,
    scope: MessageScope,
    profile_id: Uuid,
) -> Result<Option<Member>, sqlx::Error> {
    let sql = match scope {
        MessageScope::Channel(_) => {
            r#"
            SELECT m.* FROM channels c
            INNER JOIN members m ON m.server_id = c.server_id
            WHERE c.id = ? AND m.profile_id = ? AND m.left_at IS NULL
            "#
        }
        MessageScope::Conversation(_) => {
            r#"
            SELECT m.* FROM conversations cv
            INNER JOIN members m ON m.id IN (cv.member_one_id, cv.member_two_id)
            WHERE cv.id = ? AND m.profile_id = ? AND m.left_at IS NULL
            "#
        }
    };
    sqlx::query(sql)
        .bind(scope.id().to_string())
        .bind(profile_id.to_string())
        .try_map(decode_member)
        .fetch_optional(pool)
        .await
}

/// Update a member's role.
pub async fn update_role(
    pool: &SqlitePool,
    id: Uuid,
    role: MemberRole,
) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query(&format!(
        "UPDATE members SET role = ?, updated_at = ? WHERE id = ? AND {LIVE} RETURNING *"
    ))
        .bind(role.as_str())
        .bind(timestamp::encode(&timestamp::now()))
        .bind(id.to_string())
        .try_map(decode_member)
        .fetch_optional(pool)
        .await
}

/// End a membership (leave or kick). The row is kept as a tombstone so the
/// member's messages and conversations stay in history; it no longer grants
/// access or shows in the roster.
pub async fn remove(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    let result = sqlx::query(&format!(
        "UPDATE members SET left_at = ?, updated_at = ? WHERE id = ? AND {LIVE}"
    ))
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
