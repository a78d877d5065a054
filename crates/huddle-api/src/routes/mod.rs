//! API route modules.

pub mod channels;
pub mod conversations;
pub mod direct_messages;
pub mod health;
pub mod members;
pub mod messages;
pub mod servers;

use huddle_common::error::{HuddleError, HuddleResult};
use serde::Deserialize;
use uuid::Uuid;

/// Identifiers and paging options passed as query parameters.
///
/// Every field is optional at the extractor level so that a missing id
/// surfaces as a 400 with our own error body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    pub server_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// Unwrap a required query id, rejecting missing and nil values.
pub(crate) fn required(id: Option<Uuid>, what: &str) -> HuddleResult<Uuid> {
    let id = id.ok_or_else(|| HuddleError::validation(format!("{what} missing")))?;
    huddle_common::validation::require_id(id, what)
}
