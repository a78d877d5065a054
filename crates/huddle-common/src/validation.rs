//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes and services.

use uuid::Uuid;
use validator::Validate;

use crate::error::HuddleError;
use crate::models::Attachment;

/// Validate a request body, returning a HuddleError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), HuddleError> {
    body.validate().map_err(|e| HuddleError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate that a string is a safe channel/server name.
pub fn validate_name(name: &str) -> Result<(), HuddleError> {
    if name.trim().is_empty() {
        return Err(HuddleError::validation("Name cannot be empty or whitespace only"));
    }

    let valid = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ');

    if !valid {
        return Err(HuddleError::validation(
            "Name can only contain letters, numbers, hyphens, underscores, and spaces",
        ));
    }

    Ok(())
}

/// Reject the nil UUID, which is what a missing identifier decodes to.
pub fn require_id(id: Uuid, what: &str) -> Result<Uuid, HuddleError> {
    if id.is_nil() {
        return Err(HuddleError::validation(format!("{what} missing")));
    }
    Ok(id)
}

/// Normalize message input: trimmed-empty content counts as absent, and at
/// least one of content or attachment must remain.
pub fn validate_message_body(
    content: Option<&str>,
    attachment: Option<&Attachment>,
    max_len: usize,
) -> Result<Option<String>, HuddleError> {
    let content = content.filter(|c| !c.trim().is_empty());

    if let Some(c) = content {
        if c.chars().count() > max_len {
            return Err(HuddleError::validation(format!(
                "Message content exceeds {max_len} characters"
            )));
        }
    }

    if let Some(a) = attachment {
        validate_attachment(a)?;
    }

    if content.is_none() && attachment.is_none() {
        return Err(HuddleError::validation("Message must have content or an attachment"));
    }

    Ok(content.map(str::to_owned))
}

/// Replacement content for an edit: non-blank and within the length limit.
pub fn validate_edit_content(content: Option<&str>, max_len: usize) -> Result<String, HuddleError> {
    match content {
        Some(c) if !c.trim().is_empty() => {
            if c.chars().count() > max_len {
                return Err(HuddleError::validation(format!(
                    "Message content exceeds {max_len} characters"
                )));
            }
            Ok(c.to_owned())
        }
        _ => Err(HuddleError::validation("Content missing")),
    }
}

/// Attachments must point at an absolute http(s) URL.
pub fn validate_attachment(attachment: &Attachment) -> Result<(), HuddleError> {
    let parsed = url::Url::parse(&attachment.url)
        .map_err(|_| HuddleError::validation("Attachment URL is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(HuddleError::validation("Attachment URL must use http or https"));
    }
    if attachment.content_type.trim().is_empty() {
        return Err(HuddleError::validation("Attachment content type missing"));
    }
    Ok(())
}
