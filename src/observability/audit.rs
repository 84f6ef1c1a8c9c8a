//! Exchange audit trail.
//!
//! Auditing is never allowed to fail a request. Sinks return a `Result`
//! so failures are visible in the signature; call sites discard it.

use std::fs::OpenOptions;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lines buffered for the writer before `record` starts dropping entries.
const AUDIT_QUEUE_DEPTH: usize = 1024;

/// One handled exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub requester: String,
    pub target: Option<String>,
    pub outcome: String,
}

impl AuditEntry {
    pub fn new(requester: &str, target: Option<&str>, outcome: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            requester: requester.to_string(),
            target: target.map(str::to_string),
            outcome: outcome.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("audit queue full, entry dropped")]
    QueueFull,
    #[error("audit writer stopped")]
    Closed,
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Emits entries as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "exchange_audit",
            exchange_id = %entry.id,
            requester = %entry.requester,
            target_service = entry.target.as_deref().unwrap_or("-"),
            outcome = %entry.outcome,
            "Exchange handled"
        );
        Ok(())
    }
}

/// Appends entries as JSON lines to a file.
///
/// `record` only encodes and enqueues; a background task owns the file and
/// does the writes, so the request path never touches the disk.
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    lines: mpsc::Sender<Vec<u8>>,
    writer: JoinHandle<()>,
}

impl JsonLinesAuditSink {
    /// Open `path` for appending and start the writer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(std::io::Error::other)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (lines, rx) = mpsc::channel(AUDIT_QUEUE_DEPTH);
        let writer = runtime.spawn(write_lines(tokio::fs::File::from_std(file), rx));
        Ok(Self { lines, writer })
    }

    /// Stop accepting entries and wait until every queued line is written.
    pub async fn close(self) {
        drop(self.lines);
        if let Err(e) = self.writer.await {
            tracing::warn!(error = %e, "Audit writer ended abnormally");
        }
    }
}

async fn write_lines(mut file: tokio::fs::File, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = file.write_all(&line).await {
            tracing::warn!(error = %e, "Audit write failed");
        }
    }
    if let Err(e) = file.flush().await {
        tracing::warn!(error = %e, "Audit flush failed");
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.lines.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AuditError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AuditError::Closed,
        })
    }
}
