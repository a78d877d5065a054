//! Server model: the community container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A Huddle server (community).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: Uuid,

    /// Server name (1-100 chars)
    pub name: String,

    /// Icon image URL (hosted by the upload collaborator)
    pub image_url: Option<String>,

    /// Code used by `POST /invites/{code}` to join as a guest
    pub invite_code: String,

    /// Owning profile
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServerRequest {
    #[validate(length(min = 1, max = 100, message = "Server name must be 1-100 characters"))]
    pub name: String,

    #[serde(rename = "imageUrl", alias = "image_url")]
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateServerRequest {
    #[validate(length(min = 1, max = 100, message = "Server name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(rename = "imageUrl", alias = "image_url")]
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}
