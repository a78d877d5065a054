//! Message model: the core content unit.
//!
//! A message lives in exactly one scope: a server channel or a member
//! conversation. The scope is a tagged variant, so "both" and "neither" cannot
//! be expressed. Messages are never hard-deleted: a soft delete clears the
//! content and attachment and flips `deleted`, irreversibly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::member::MemberWithProfile;
use crate::timestamp;

/// Where a message lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageScope {
    Channel(Uuid),
    Conversation(Uuid),
}

impl MessageScope {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Channel(id) | Self::Conversation(id) => *id,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Channel(_) => ScopeKind::Channel,
            Self::Conversation(_) => ScopeKind::Conversation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Channel,
    Conversation,
}

/// Reference to a file hosted by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
}

/// A message in a channel or conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,

    pub scope: MessageScope,

    /// Author membership id
    pub author_id: Uuid,

    /// Text content; `None` for attachment-only and deleted messages
    pub content: Option<String>,

    pub attachment: Option<Attachment>,

    pub deleted: bool,

    /// Set by the first successful edit
    pub edited: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Message joined with its author's membership and profile.
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithAuthor {
    #[serde(flatten)]
    pub message: Message,
    pub author: MemberWithProfile,
}

/// Keyset pagination cursor: the `(created_at, id)` of the last message seen.
///
/// Pages walk backwards in time from the cursor. Messages appended after the
/// cursor was issued sort strictly above it, so they never shift the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", timestamp::encode(&self.created_at), self.id)
    }
}

impl FromStr for PageCursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, id) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("malformed cursor: {s}"))?;
        let created_at = timestamp::decode(ts).map_err(|e| format!("malformed cursor: {e}"))?;
        let id = Uuid::parse_str(id).map_err(|e| format!("malformed cursor: {e}"))?;
        Ok(Self { created_at, id })
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageWithAuthor>,
    /// Present when the page was full; pass it back to fetch older messages.
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// Create message request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    pub content: Option<String>,

    #[serde(rename = "fileUrl", alias = "file_url")]
    #[validate(url(message = "File URL must be a valid URL"))]
    pub file_url: Option<String>,

    #[serde(rename = "fileType", alias = "file_type")]
    pub file_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
}
