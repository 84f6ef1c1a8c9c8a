//! Error responses for the exchange endpoint.
//!
//! Every failure shares the `{"success": false, "error"}` body. A peer's
//! own 4xx status is passed through; its body is not.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::exchange::envelope::ErrorBody;
use crate::exchange::error::ExchangeError;

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
