//! Shared JWT validation.
//!
//! Tokens are issued by the external identity provider; Huddle only verifies
//! them. Claims and validation live here so both huddle-api and
//! huddle-gateway can use them without circular dependencies.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by a provider-issued access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (provider user id)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Sign claims with the shared secret. Used by tests and local tooling that
/// stand in for the identity provider.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: "user_123".into(),
            name: "Ada".into(),
            picture: None,
            email: Some("ada@example.com".into()),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn valid_token_round_trips() {
        let token = issue_token(&claims(3600), "secret").unwrap();
        let decoded = validate_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "user_123");
        assert_eq!(decoded.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&claims(3600), "secret").unwrap();
        assert!(validate_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(&claims(-3600), "secret").unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }
}
