//! Bearer-guarded internal endpoints (peer-to-hub push, diagnostics).

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::internal_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub use error::InternalError;

pub fn setup_internal_router(state: AppState) -> Router {
    Router::new()
        .route("/internal/status", get(get_status))
        .route("/internal/breakers", get(get_breakers))
        .route("/internal/resources/{resource}", post(push_resource))
        .route_layer(middleware::from_fn_with_state(state.clone(), internal_auth_middleware))
        .with_state(state)
}
