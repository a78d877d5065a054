//! Profile repository: local mirror of provider identities.

use huddle_common::models::Profile;
use huddle_common::{snowflake, timestamp};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::rows::decode_profile;

/// Create the mirror row for `user_id`, or refresh its display fields.
pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    image_url: Option<&str>,
    email: Option<&str>,
) -> Result<Profile, sqlx::Error> {
    let now = timestamp::encode(&timestamp::now());
    sqlx::query(
        r#"
        INSERT INTO profiles (id, user_id, name, image_url, email, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            name = excluded.name,
            image_url = excluded.image_url,
            email = COALESCE(excluded.email, profiles.email),
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(snowflake::generate_id().to_string())
    .bind(user_id)
    .bind(name)
    .bind(image_url)
    .bind(email)
    .bind(&now)
    .bind(&now)
    .try_map(decode_profile)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query("SELECT * FROM profiles WHERE id = ?")
        .bind(id.to_string())
        .try_map(decode_profile)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_user_id(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .try_map(decode_profile)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn upsert_keeps_id_and_refreshes_fields() {
        let db = fixtures::db().await;
        let first = upsert(&db.pool, "sub-1", "Ada", None, Some("ada@example.com"))
            .await
            .unwrap();
        let second = upsert(&db.pool, "sub-1", "Ada L.", Some("https://img/a.png"), None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ada L.");
        assert_eq!(second.image_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(second.email.as_deref(), Some("ada@example.com"));

        let found = find_by_user_id(&db.pool, "sub-1").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(find_by_id(&db.pool, Uuid::now_v7()).await.unwrap().is_none());
    }
}
