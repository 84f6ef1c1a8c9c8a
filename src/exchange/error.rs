//! Exchange error taxonomy.

use thiserror::Error;

/// Failures that cross the boundary of the exchange subsystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// Unknown or disallowed caller.
    #[error("{0}")]
    Authorization(String),

    /// Malformed envelope, bad payload or disallowed field.
    #[error("{0}")]
    Validation(String),

    /// Target peer is unknown or not allowed.
    #[error("{0}")]
    UnknownTarget(String),

    /// Peer answered 4xx; the request itself must change.
    #[error("peer {peer} rejected the request with status {status}")]
    PeerRejected { peer: String, status: u16 },
}

impl ExchangeError {
    /// HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            ExchangeError::Authorization(_) => 403,
            ExchangeError::Validation(_) => 400,
            ExchangeError::UnknownTarget(_) => 503,
            ExchangeError::PeerRejected { status, .. } => *status,
        }
    }

    /// Short label for metrics and audit.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Authorization(_) => "unauthorized",
            ExchangeError::Validation(_) => "invalid",
            ExchangeError::UnknownTarget(_) => "unknown_target",
            ExchangeError::PeerRejected { .. } => "peer_rejected",
        }
    }
}
