//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to peer:
//!     → circuit_breaker.rs (admit, or reject without a network attempt)
//!     → timeouts.rs (enforce the per-call deadline)
//!     → circuit_breaker.rs (record success / failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every peer call has a deadline
//! - No retries inside a call: one attempt, then fallback
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    Admission, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry,
    CircuitState,
};
pub use timeouts::{with_deadline, DeadlineExceeded};
