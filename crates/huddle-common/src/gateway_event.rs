//! Realtime event types, shared between the API and Gateway crates.
//!
//! The API publishes a [`MessageEvent`] after every durable message mutation
//! and the gateway forwards it to every socket subscribed to the event's
//! [`Topic`]. This module lives in `huddle-common` so both crates can use it
//! without circular deps.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageScope, MessageWithAuthor, ScopeKind};

/// Schema version stamped on every event. Bump on breaking payload changes.
pub const EVENT_VERSION: u16 = 1;

/// A broadcast topic: one per channel and one per conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub kind: ScopeKind,
    pub id: Uuid,
}

impl Topic {
    /// Textual key, `chat:<id>:messages`.
    pub fn key(&self) -> String {
        format!("chat:{}:messages", self.id)
    }
}

impl From<MessageScope> for Topic {
    fn from(scope: MessageScope) -> Self {
        Self {
            kind: scope.kind(),
            id: scope.id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEventKind {
    Created,
    Updated,
    Deleted,
}

/// A message mutation, as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub version: u16,
    pub kind: MessageEventKind,
    /// Topic key the event was published on
    pub topic: String,
    pub message: MessageWithAuthor,
}

impl MessageEvent {
    pub fn new(kind: MessageEventKind, message: MessageWithAuthor) -> Self {
        Self {
            version: EVENT_VERSION,
            kind,
            topic: Topic::from(message.message.scope).key(),
            message,
        }
    }

    pub fn topic(&self) -> Topic {
        Topic::from(self.message.message.scope)
    }
}
