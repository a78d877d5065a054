//! Middleware: authentication extraction and security headers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use huddle_common::error::HuddleError;

use crate::AppState;

/// Identity extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Provider subject id
    pub subject: String,
    pub name: String,
    pub image_url: Option<String>,
    pub email: Option<String>,
}

/// Extract and validate the JWT from the `Authorization: Bearer <token>` header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HuddleError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(HuddleError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(HuddleError::Unauthenticated)?;

    let claims = huddle_common::auth::validate_token(token, &state.jwt_secret)
        .map_err(|_| HuddleError::InvalidToken)?;

    if claims.sub.trim().is_empty() {
        return Err(HuddleError::InvalidToken);
    }

    let auth_ctx = AuthContext {
        subject: claims.sub,
        name: claims.name,
        image_url: claims.picture,
        email: claims.email,
    };

    // Insert auth context into request extensions for handlers to use
    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert($name, v);
            }
        };
    }

    set!(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    set!(header::X_FRAME_OPTIONS, "DENY");
    set!(header::REFERRER_POLICY, "strict-origin-when-cross-origin");
    set!(
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=63072000; includeSubDomains"
    );

    response
}
