//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, limits, timeouts)
//!     → /exchange  → rate limit → exchange handler
//!     → /internal  → bearer guard → internal handlers
//!     → response.rs (error bodies)
//! ```

pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
