//! Member model: an identity's membership in a specific server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::ProfileSummary;

/// Server role. Variants are declared in ascending privilege, so the derived
/// ordering gives `Guest < Moderator < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Guest,
    Moderator,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "GUEST",
            Self::Moderator => "MODERATOR",
            Self::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GUEST" => Some(Self::Guest),
            "MODERATOR" => Some(Self::Moderator),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Roles allowed to moderate other people's content and manage channels.
    pub fn is_moderation_capable(&self) -> bool {
        matches!(self, Self::Admin | Self::Moderator)
    }
}

/// Represents a profile's membership in a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub server_id: Uuid,
    pub profile_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member joined with its profile, as listed in the server sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct MemberWithProfile {
    #[serde(flatten)]
    pub member: Member,
    pub profile: ProfileSummary,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(MemberRole::Guest < MemberRole::Moderator);
        assert!(MemberRole::Moderator < MemberRole::Admin);
    }

    #[test]
    fn role_text_round_trips() {
        for role in [MemberRole::Guest, MemberRole::Moderator, MemberRole::Admin] {
            assert_eq!(MemberRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MemberRole::parse("OWNER"), None);
    }

    #[test]
    fn role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&MemberRole::Moderator).unwrap(), "\"MODERATOR\"");
    }
}
