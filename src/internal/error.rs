//! Errors returned by the internal endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::exchange::envelope::ErrorBody;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InternalError {
    /// No shared secret configured; the endpoints stay closed.
    #[error("internal endpoints are not configured")]
    NotConfigured,

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("resource '{0}' is not permitted")]
    UnknownResource(String),

    #[error("invalid record: {0}")]
    BadRecord(String),
}

impl InternalError {
    pub fn status(&self) -> StatusCode {
        match self {
            InternalError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            InternalError::Unauthorized => StatusCode::UNAUTHORIZED,
            InternalError::UnknownResource(_) | InternalError::BadRecord(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
