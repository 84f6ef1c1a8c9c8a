//! Fallback data subsystem.
//!
//! # Data Flow
//! ```text
//! First substitution request:
//!     → provider.rs (single-flight load over the ordered source list)
//!     → snapshot.rs (versioned peer → document map, read-only)
//!
//! Every substitution:
//!     → snapshot document for the peer (or {})
//!     → echo identifying fields from the request
//! ```
//!
//! # Design Decisions
//! - Loaded at most once per process, even if every source fails
//! - An unreachable source degrades to an empty snapshot, never an error

pub mod provider;
pub mod snapshot;

pub use provider::{FallbackError, FallbackProvider};
pub use snapshot::FallbackSnapshot;
