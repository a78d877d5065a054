//! Socket protocol frames.
//!
//! Frames are JSON objects `{"op": <name>, "d": <payload>}`. Opcodes are named,
//! not numbered.

use std::sync::Arc;

use huddle_common::gateway_event::MessageEvent;
use huddle_common::models::{MessageScope, ProfileSummary};
use serde::{Deserialize, Serialize};

/// Heartbeat interval advertised in `Hello`, in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Client → Server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", content = "d")]
pub enum ClientFrame {
    /// Authenticate with a provider-issued access token
    Identify { token: String },

    /// Start receiving message events for a channel or conversation
    Subscribe { scope: MessageScope },

    Unsubscribe { scope: MessageScope },

    /// Keepalive ping
    Heartbeat { timestamp: i64 },
}

/// Server → Client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", content = "d")]
pub enum ServerFrame {
    /// Sent on connect to prompt the client to Identify
    Hello { heartbeat_interval: u64 },

    /// Identify accepted
    Ready { session_id: String, profile: ProfileSummary },

    /// Token rejected, or a request arrived before Identify
    InvalidSession,

    Subscribed { topic: String },

    Unsubscribed { topic: String },

    HeartbeatAck { timestamp: i64 },

    /// A message mutation on a subscribed topic
    Dispatch { event: Arc<MessageEvent> },

    /// A request was understood but refused
    Error { message: String },
}

impl ServerFrame {
    pub fn to_json(&self) -> String {
        // Frames contain only strings, numbers and ids; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"op":"Error","d":null}"#.into())
    }
}
