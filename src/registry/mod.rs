//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! HubConfig.peers + HubConfig.access
//!     → peer.rs (one immutable PeerDescriptor per peer)
//!     → lookup.rs (case-insensitive lookup gated by the allow-list)
//!     → Resolution::Ready | Resolution::NotConfigured
//! ```
//!
//! # Design Decisions
//! - Built once from config; never mutated afterwards
//! - A peer without a base URL is a normal outcome, not an error

pub mod peer;
pub mod lookup;

pub use peer::PeerDescriptor;
pub use lookup::{Resolution, ServiceRegistry};
