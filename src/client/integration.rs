//! Outbound integration client.
//!
//! # Responsibilities
//! - Single choke point for every call this process makes to a peer
//! - Consult the breaker before touching the network
//! - Turn unavailability into a provenance-tagged fallback result
//!
//! # Design Decisions
//! - `call` only fails for a 4xx: the peer understood and refused
//! - A 4xx proves the peer is alive, so it counts as a breaker success
//! - A 2xx whose body is not an envelope is treated like a 5xx

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::client::transport::{OutboundEnvelope, PeerReply, PeerTransport, TransportError};
use crate::exchange::payload::{encode_payload, Document};
use crate::fallback::FallbackProvider;
use crate::observability::metrics;
use crate::registry::{Resolution, ServiceRegistry};
use crate::resilience::{Admission, CircuitBreakerRegistry};

/// Where a result's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    LiveResponse,
    FallbackCircuitOpen,
    FallbackNotConfigured,
    FallbackCallError,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::LiveResponse => "liveResponse",
            Provenance::FallbackCircuitOpen => "fallbackCircuitOpen",
            Provenance::FallbackNotConfigured => "fallbackNotConfigured",
            Provenance::FallbackCallError => "fallbackCallError",
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Provenance::LiveResponse)
    }
}

/// Result of a peer call, live or substituted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResult {
    pub peer_name: String,
    pub payload: Value,
    pub provenance: Provenance,
    pub timestamp: DateTime<Utc>,
}

/// The only failure `call` reports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("peer {peer} rejected the request with status {status}")]
    PeerRejected { peer: String, status: u16 },
}

/// Response envelope returned by a peer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyEnvelope {
    #[serde(default, alias = "peerName")]
    service_name: Option<String>,
    payload: Option<Value>,
}

/// Extract the responder name and payload from a 2xx reply body.
fn decode_reply(body: &str) -> Result<(Option<String>, Value), TransportError> {
    let envelope: ReplyEnvelope =
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))?;
    let payload = match envelope.payload {
        None | Some(Value::Null) => {
            return Err(TransportError::Decode("reply has no payload".into()))
        }
        Some(Value::String(text)) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Some(other) => other,
    };
    Ok((envelope.service_name, payload))
}

/// Holds an admission until its outcome is recorded. Dropped while still
/// armed (the calling future was cancelled), it hands its half-open slot back.
struct AdmissionGuard<'a> {
    breakers: &'a CircuitBreakerRegistry,
    peer: &'a str,
    admission: Admission,
    armed: bool,
}

impl<'a> AdmissionGuard<'a> {
    fn new(breakers: &'a CircuitBreakerRegistry, peer: &'a str, admission: Admission) -> Self {
        Self {
            breakers,
            peer,
            admission,
            armed: true,
        }
    }

    fn disarm(&mut self) -> Admission {
        self.armed = false;
        self.admission
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(peer = %self.peer, "Peer call cancelled before completion");
            self.breakers.release(self.peer, self.admission);
        }
    }
}

/// Calls peers with circuit breaking, deadlines and fallback substitution.
pub struct IntegrationClient {
    registry: Arc<ServiceRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    fallback: Arc<FallbackProvider>,
    transport: Arc<dyn PeerTransport>,
    requester_name: String,
    timeout: Duration,
}

impl IntegrationClient {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        fallback: Arc<FallbackProvider>,
        transport: Arc<dyn PeerTransport>,
        requester_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            breakers,
            fallback,
            transport,
            requester_name: requester_name.into(),
            timeout,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Call `peer_name` with `payload`.
    ///
    /// Always yields a result unless the peer answered with a 4xx.
    pub async fn call(
        &self,
        peer_name: &str,
        payload: &Document,
    ) -> Result<IntegrationResult, IntegrationError> {
        let (peer, url) = match self.registry.resolve(peer_name) {
            Some(Resolution::Ready(peer)) => match peer.exchange_url() {
                Some(url) => (peer.name.as_str(), url),
                None => return Ok(self.substitute(&peer.name, payload, Provenance::FallbackNotConfigured).await),
            },
            Some(Resolution::NotConfigured(peer)) => {
                tracing::debug!(peer = %peer.name, "Peer has no base URL, using fallback");
                return Ok(self.substitute(&peer.name, payload, Provenance::FallbackNotConfigured).await);
            }
            None => {
                tracing::debug!(peer = %peer_name, "Peer unknown or not allowed, using fallback");
                return Ok(self.substitute(peer_name, payload, Provenance::FallbackNotConfigured).await);
            }
        };

        let admission = self.breakers.try_acquire(peer);
        if !admission.is_permitted() {
            tracing::debug!(peer = %peer, "Circuit open, skipping network call");
            return Ok(self.substitute(peer, payload, Provenance::FallbackCircuitOpen).await);
        }

        let envelope = OutboundEnvelope {
            requester_name: self.requester_name.clone(),
            payload: encode_payload(payload),
        };
        let mut guard = AdmissionGuard::new(&self.breakers, peer, admission);
        let started = Instant::now();
        let outcome = self.transport.send(&url, &envelope, self.timeout).await;
        metrics::record_peer_latency(peer, started);
        let admission = guard.disarm();

        match outcome {
            Ok(reply) => self.interpret(peer, admission, reply, payload).await,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Peer call failed");
                self.breakers.record_failure(peer, admission);
                Ok(self.substitute(peer, payload, Provenance::FallbackCallError).await)
            }
        }
    }

    async fn interpret(
        &self,
        peer: &str,
        admission: Admission,
        reply: PeerReply,
        request: &Document,
    ) -> Result<IntegrationResult, IntegrationError> {
        match reply.status {
            200..=299 => match decode_reply(&reply.body) {
                Ok((responder, payload)) => {
                    tracing::debug!(peer = %peer, responder = ?responder, "Peer answered");
                    self.breakers.record_success(peer, admission);
                    metrics::record_peer_call(peer, Provenance::LiveResponse.as_str());
                    Ok(IntegrationResult {
                        peer_name: peer.to_string(),
                        payload,
                        provenance: Provenance::LiveResponse,
                        timestamp: Utc::now(),
                    })
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "Peer returned an unreadable reply");
                    self.breakers.record_failure(peer, admission);
                    Ok(self.substitute(peer, request, Provenance::FallbackCallError).await)
                }
            },
            400..=499 => {
                tracing::info!(peer = %peer, status = reply.status, "Peer rejected request");
                self.breakers.record_success(peer, admission);
                metrics::record_peer_call(peer, "rejected");
                Err(IntegrationError::PeerRejected {
                    peer: peer.to_string(),
                    status: reply.status,
                })
            }
            status => {
                tracing::warn!(peer = %peer, status, "Peer unavailable");
                self.breakers.record_failure(peer, admission);
                Ok(self.substitute(peer, request, Provenance::FallbackCallError).await)
            }
        }
    }

    async fn substitute(
        &self,
        peer: &str,
        request: &Document,
        provenance: Provenance,
    ) -> IntegrationResult {
        metrics::record_peer_call(peer, provenance.as_str());
        IntegrationResult {
            peer_name: peer.to_string(),
            payload: self.fallback.substitute(peer, request).await,
            provenance,
            timestamp: Utc::now(),
        }
    }
}
