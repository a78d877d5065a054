//! SQLite row-extraction helpers.
//!
//! Ids and timestamps are stored as text (see the migration header), so every
//! such column is fetched as `String` and converted here. The model types live
//! in `huddle-common`, which keeps them free of storage concerns; the
//! `decode_*` functions below are what repository queries hand to
//! `Query::try_map`.
//!
//! All functions return `sqlx::Error` so they slot straight into query
//! pipelines.

use chrono::{DateTime, Utc};
use huddle_common::models::{
    Attachment, Channel, ChannelKind, Conversation, Member, MemberRole, MemberWithProfile,
    Message, MessageScope, MessageWithAuthor, Profile, ProfileSummary, Server,
};
use huddle_common::timestamp;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

// ── Uuid ─────────────────────────────────────────────────────────────────────

pub fn get_uuid(row: &SqliteRow, col: &str) -> Result<Uuid, sqlx::Error> {
    let s: String = row.try_get(col)?;
    Uuid::parse_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e) as _))
}

pub fn get_opt_uuid(row: &SqliteRow, col: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let s: Option<String> = row.try_get(col)?;
    s.map(|v| Uuid::parse_str(&v).map_err(|e| sqlx::Error::Decode(Box::new(e) as _)))
        .transpose()
}

// ── DateTime<Utc> ─────────────────────────────────────────────────────────────

pub fn get_datetime(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let s: String = row.try_get(col)?;
    timestamp::decode(&s).map_err(|e| decode_err(format!("cannot parse timestamp {s:?}: {e}")))
}

// ── Models ───────────────────────────────────────────────────────────────────

pub fn decode_profile(row: SqliteRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        id: get_uuid(&row, "id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        email: row.try_get("email")?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
    })
}

pub fn decode_server(row: SqliteRow) -> Result<Server, sqlx::Error> {
    Ok(Server {
        id: get_uuid(&row, "id")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        invite_code: row.try_get("invite_code")?,
        owner_id: get_uuid(&row, "owner_id")?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
    })
}

fn member_columns(row: &SqliteRow, prefix: &str) -> Result<Member, sqlx::Error> {
    let col = |name: &str| format!("{prefix}{name}");
    let role: String = row.try_get(col("role").as_str())?;
    Ok(Member {
        id: get_uuid(row, &col("id"))?,
        server_id: get_uuid(row, &col("server_id"))?,
        profile_id: get_uuid(row, &col("profile_id"))?,
        role: MemberRole::parse(&role).ok_or_else(|| decode_err(format!("unknown role {role:?}")))?,
        created_at: get_datetime(row, &col("created_at"))?,
        updated_at: get_datetime(row, &col("updated_at"))?,
    })
}

pub fn decode_member(row: SqliteRow) -> Result<Member, sqlx::Error> {
    member_columns(&row, "")
}

fn profile_summary_columns(row: &SqliteRow, member: &Member) -> Result<ProfileSummary, sqlx::Error> {
    Ok(ProfileSummary {
        id: member.profile_id,
        name: row.try_get("p_name")?,
        image_url: row.try_get("p_image_url")?,
    })
}

/// Member columns unprefixed, profile columns as `p_name` / `p_image_url`.
pub fn decode_member_with_profile(row: SqliteRow) -> Result<MemberWithProfile, sqlx::Error> {
    let member = member_columns(&row, "")?;
    let profile = profile_summary_columns(&row, &member)?;
    Ok(MemberWithProfile { member, profile })
}

pub fn decode_channel(row: SqliteRow) -> Result<Channel, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(Channel {
        id: get_uuid(&row, "id")?,
        server_id: get_uuid(&row, "server_id")?,
        name: row.try_get("name")?,
        kind: ChannelKind::parse(&kind)
            .ok_or_else(|| decode_err(format!("unknown channel kind {kind:?}")))?,
        profile_id: get_uuid(&row, "profile_id")?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
    })
}

pub fn decode_conversation(row: SqliteRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: get_uuid(&row, "id")?,
        member_one_id: get_uuid(&row, "member_one_id")?,
        member_two_id: get_uuid(&row, "member_two_id")?,
        created_at: get_datetime(&row, "created_at")?,
    })
}

fn message_columns(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    let scope = match (
        get_opt_uuid(row, "channel_id")?,
        get_opt_uuid(row, "conversation_id")?,
    ) {
        (Some(channel_id), None) => MessageScope::Channel(channel_id),
        (None, Some(conversation_id)) => MessageScope::Conversation(conversation_id),
        _ => return Err(decode_err("message row must have exactly one scope".into())),
    };

    let url: Option<String> = row.try_get("attachment_url")?;
    let content_type: Option<String> = row.try_get("attachment_type")?;
    let attachment = match (url, content_type) {
        (Some(url), Some(content_type)) => Some(Attachment { url, content_type }),
        _ => None,
    };

    Ok(Message {
        id: get_uuid(row, "id")?,
        scope,
        author_id: get_uuid(row, "author_id")?,
        content: row.try_get("content")?,
        attachment,
        deleted: row.try_get("deleted")?,
        edited: row.try_get("edited")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}

pub fn decode_message(row: SqliteRow) -> Result<Message, sqlx::Error> {
    message_columns(&row)
}

/// Message columns unprefixed, author member columns prefixed `a_`, author
/// profile columns as `p_name` / `p_image_url`.
pub fn decode_message_with_author(row: SqliteRow) -> Result<MessageWithAuthor, sqlx::Error> {
    let message = message_columns(&row)?;
    let member = member_columns(&row, "a_")?;
    let profile = profile_summary_columns(&row, &member)?;
    Ok(MessageWithAuthor {
        message,
        author: MemberWithProfile { member, profile },
    })
}
