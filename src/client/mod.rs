//! Outbound integration subsystem.
//!
//! # Data Flow
//! ```text
//! call(peer, payload)
//!     → registry (not configured? → fallback)
//!     → circuit breaker (rejected? → fallback)
//!     → transport.rs (one HTTP attempt under a deadline)
//!     → integration.rs (2xx → live, 4xx → PeerRejected, else → fallback)
//! ```
//!
//! # Design Decisions
//! - Every peer call in the process goes through `IntegrationClient`
//! - Peer unavailability never reaches the caller; only a 4xx does
//! - The transport is a trait object so tests can count network attempts

pub mod integration;
pub mod transport;

pub use integration::{IntegrationClient, IntegrationError, IntegrationResult, Provenance};
pub use transport::{HttpTransport, OutboundEnvelope, PeerReply, PeerTransport, TransportError};
