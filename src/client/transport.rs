//! HTTP transport to peers.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use thiserror::Error;

use crate::resilience::with_deadline;

/// Envelope sent to a peer's exchange endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub requester_name: String,
    /// JSON-encoded payload document.
    pub payload: String,
}

/// Raw reply from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReply {
    pub status: u16,
    pub body: String,
}

impl PeerReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Reasons a peer could not be reached or understood.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("malformed reply: {0}")]
    Decode(String),
}

/// Sends one envelope to one URL.
pub trait PeerTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        url: &'a str,
        envelope: &'a OutboundEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<PeerReply, TransportError>>;
}

/// `reqwest`-backed transport sharing one connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl PeerTransport for HttpTransport {
    fn send<'a>(
        &'a self,
        url: &'a str,
        envelope: &'a OutboundEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<PeerReply, TransportError>> {
        async move {
            // The deadline covers both the send and the body read.
            with_deadline(timeout, async {
                let response = self
                    .client
                    .post(url)
                    .json(envelope)
                    .send()
                    .await
                    .map_err(classify)?;
                let status = response.status().as_u16();
                let body = response.text().await.map_err(classify)?;
                Ok::<PeerReply, TransportError>(PeerReply { status, body })
            })
            .await
            .map_err(|e| TransportError::Timeout(e.0))?
        }
        .boxed()
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn envelope() -> OutboundEnvelope {
        OutboundEnvelope {
            requester_name: "DirectoryHub".into(),
            payload: "{}".into(),
        }
    }

    #[test]
    fn test_envelope_wire_names() {
        let json = serde_json::to_value(envelope()).unwrap();
        assert_eq!(json, serde_json::json!({"requesterName": "DirectoryHub", "payload": "{}"}));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(5)).await;
                let _ = socket.shutdown().await;
            }
        });

        let transport = HttpTransport::default();
        let url = format!("http://{}/exchange", addr);
        let env = envelope();
        let result = transport.send(&url, &env, Duration::from_millis(200)).await;
        assert_eq!(result, Err(TransportError::Timeout(Duration::from_millis(200))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let transport = HttpTransport::default();
        let url = format!("http://{}/exchange", addr);
        let env = envelope();
        let result = transport.send(&url, &env, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(TransportError::Connect(_)) | Err(TransportError::Request(_))));
    }

    #[tokio::test]
    async fn test_reply_status_and_body_are_returned() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let body = "{\"error\":\"bad\"}";
                let response = format!(
                    "HTTP/1.1 422 Unprocessable Entity\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let transport = HttpTransport::default();
        let url = format!("http://{}/exchange", addr);
        let env = envelope();
        let reply = transport.send(&url, &env, Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply, PeerReply::new(422, "{\"error\":\"bad\"}"));
    }
}
