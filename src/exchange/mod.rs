//! Exchange protocol subsystem.
//!
//! # Data Flow
//! ```text
//! POST /exchange body
//!     → envelope.rs (requesterName + payload)
//!     → handler.rs (caller allow-list)
//!     → payload.rs (parse, refuse raw queries)
//!     → whitelist.rs (check resource.field references)
//!     → local.rs (answer for this service)
//!       or client::IntegrationClient (forward to the target peer)
//! ```
//!
//! # Design Decisions
//! - Callers select whitelisted fields; free-form queries never pass
//! - Only authorization, validation and peer rejection surface as errors

pub mod envelope;
pub mod error;
pub mod handler;
pub mod local;
pub mod payload;
pub mod whitelist;

pub use envelope::{ErrorBody, ExchangeResponse, InboundEnvelope};
pub use error::ExchangeError;
pub use handler::ExchangeHandler;
pub use local::{InMemoryDirectory, LocalDataError, LocalDataSource};
pub use whitelist::{FieldSelection, FieldWhitelist};
