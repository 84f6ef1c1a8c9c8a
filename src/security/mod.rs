//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! POST /exchange:
//!     → rate_limit.rs (per-address request budget)
//!     → exchange handler (caller allow-list, payload checks)
//!
//! /internal/*:
//!     → internal/auth.rs (shared secret, fail closed)
//! ```
//!
//! # Design Decisions
//! - Fail closed: no configured secret disables internal endpoints
//! - Rate limiting never consumes a circuit breaker attempt

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiterState};
