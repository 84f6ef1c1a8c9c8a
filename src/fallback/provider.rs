//! Fallback provider.
//!
//! # Responsibilities
//! - Load the snapshot once, trying each configured source in order
//! - Produce substitute documents shaped like a live answer

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::{FallbackConfig, FallbackSource};
use crate::exchange::payload::{identifying_fields, Document};
use crate::fallback::snapshot::FallbackSnapshot;
use crate::observability::metrics;
use crate::resilience::with_deadline;

/// Deadline for fetching a remote snapshot.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors loading a single snapshot source. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("source returned status {0}")]
    Status(u16),
    #[error("source timed out")]
    Timeout,
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplies substitute documents when a peer cannot answer.
#[derive(Debug)]
pub struct FallbackProvider {
    sources: Vec<FallbackSource>,
    echo_fields: Vec<String>,
    http: reqwest::Client,
    snapshot: OnceCell<Arc<FallbackSnapshot>>,
    loads: AtomicUsize,
}

impl FallbackProvider {
    pub fn new(config: &FallbackConfig, http: reqwest::Client) -> Self {
        Self {
            sources: config.sources.clone(),
            echo_fields: config.echo_fields.clone(),
            http,
            snapshot: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Provider with an already-loaded snapshot.
    pub fn with_snapshot(snapshot: FallbackSnapshot, echo_fields: Vec<String>) -> Self {
        Self {
            sources: Vec::new(),
            echo_fields,
            http: reqwest::Client::new(),
            snapshot: OnceCell::new_with(Some(Arc::new(snapshot))),
            loads: AtomicUsize::new(0),
        }
    }

    /// The cached snapshot, loading it on first access.
    pub async fn snapshot(&self) -> Arc<FallbackSnapshot> {
        self.snapshot
            .get_or_init(|| async { Arc::new(self.load().await) })
            .await
            .clone()
    }

    /// Number of times the source list has been walked.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Substitute document for `peer`, echoing identifying request fields.
    pub async fn substitute(&self, peer: &str, request: &Document) -> Value {
        let snapshot = self.snapshot().await;
        let echoed = identifying_fields(request, &self.echo_fields);

        let mut doc = match snapshot.get(peer) {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut wrapped = Document::new();
                wrapped.insert("data".to_string(), other.clone());
                wrapped
            }
            None => Document::new(),
        };
        for (k, v) in echoed {
            doc.insert(k, v);
        }
        Value::Object(doc)
    }

    async fn load(&self) -> FallbackSnapshot {
        self.loads.fetch_add(1, Ordering::Relaxed);

        for source in &self.sources {
            match self.load_source(source).await {
                Ok(snapshot) => {
                    tracing::info!(
                        source = ?source,
                        version = snapshot.version().unwrap_or("unversioned"),
                        entries = snapshot.len(),
                        "Loaded fallback snapshot"
                    );
                    metrics::record_fallback_entries(snapshot.len());
                    return snapshot;
                }
                Err(e) => {
                    tracing::warn!(source = ?source, error = %e, "Fallback source unavailable");
                }
            }
        }

        tracing::warn!("No fallback source resolved; substitutions will be empty");
        metrics::record_fallback_entries(0);
        FallbackSnapshot::default()
    }

    async fn load_source(&self, source: &FallbackSource) -> Result<FallbackSnapshot, FallbackError> {
        let text = match source {
            FallbackSource::File { path } => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FallbackError::Io { path: path.clone(), source })?,
            FallbackSource::Http { url } => with_deadline(SOURCE_TIMEOUT, async {
                let response = self.http.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(FallbackError::Status(response.status().as_u16()));
                }
                Ok::<String, FallbackError>(response.text().await?)
            })
            .await
            .map_err(|_| FallbackError::Timeout)??,
        };
        Ok(FallbackSnapshot::from_json(&text)?)
    }
}
