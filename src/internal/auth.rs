use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::internal::error::InternalError;

/// Check a bearer header against the configured secret.
pub fn authorize(secret: Option<&str>, authorization: Option<&str>) -> Result<(), InternalError> {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return Err(InternalError::NotConfigured),
    };

    match authorization.and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if token == secret => Ok(()),
        _ => Err(InternalError::Unauthorized),
    }
}

pub async fn internal_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, InternalError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Err(e) = authorize(state.config.internal.shared_secret.as_deref(), auth_header) {
        tracing::warn!(path = %request.uri().path(), error = %e, "Internal request refused");
        return Err(e);
    }

    Ok(next.run(request).await)
}
