//! Time-sortable id generation.
//!
//! Every row id in Huddle is a UUID v7: 48 bits of Unix milliseconds followed
//! by random bits. Ids sort by creation time, which the message pagination
//! cursor relies on as its tie-breaker.

use uuid::Uuid;

/// Generate a new time-sortable id.
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Short random invite code for a server.
pub fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()
}
