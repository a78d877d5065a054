//! Profile model: the local mirror of an identity issued by the auth provider.
//!
//! Huddle never owns credentials. The provider's subject id is the stable key;
//! display name and avatar are refreshed from the token each time the mirror
//! is touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,

    /// Provider-issued subject identifier
    pub user_id: String,

    pub name: String,

    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public slice of a profile, embedded in member listings and messages.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
}

impl From<&Profile> for ProfileSummary {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            image_url: p.image_url.clone(),
        }
    }
}
