//! Inbound exchange handler.
//!
//! # Responsibilities
//! - Authenticate the caller by requester name
//! - Validate payload shape and field selection
//! - Answer locally, or forward through the integration client
//!
//! # Design Decisions
//! - Every rejection happens before any data source or peer is touched
//! - Forwarded results are returned verbatim, provenance included

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::client::{IntegrationClient, IntegrationError};
use crate::exchange::envelope::{ExchangeResponse, InboundEnvelope};
use crate::exchange::error::ExchangeError;
use crate::exchange::local::LocalDataSource;
use crate::exchange::payload::{encode_payload, find_forbidden_key, identifying_fields, parse_payload, Document};
use crate::exchange::whitelist::FieldWhitelist;
use crate::observability::audit::{AuditEntry, AuditSink};

/// Payload key naming the service that should answer.
pub const TARGET_KEY: &str = "targetService";

pub struct ExchangeHandler {
    service_name: String,
    client: Arc<IntegrationClient>,
    local: Arc<dyn LocalDataSource>,
    whitelist: FieldWhitelist,
    audit: Arc<dyn AuditSink>,
    echo_fields: Vec<String>,
}

impl ExchangeHandler {
    pub fn new(
        service_name: impl Into<String>,
        client: Arc<IntegrationClient>,
        local: Arc<dyn LocalDataSource>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            client,
            local,
            whitelist: FieldWhitelist::standard(),
            audit,
            echo_fields: Vec::new(),
        }
    }

    pub fn with_whitelist(mut self, whitelist: FieldWhitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_echo_fields(mut self, echo_fields: Vec<String>) -> Self {
        self.echo_fields = echo_fields;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn whitelist(&self) -> &FieldWhitelist {
        &self.whitelist
    }

    /// Handle one inbound exchange.
    pub async fn handle(&self, envelope: InboundEnvelope) -> Result<ExchangeResponse, ExchangeError> {
        let requester = envelope.requester_name.as_deref().map(str::trim).unwrap_or_default();
        let result = self.process(requester, envelope.payload.as_ref()).await;

        let (target, outcome) = match &result {
            Ok((target, response)) => (
                target.as_deref(),
                response.source.clone().unwrap_or_else(|| "local".to_string()),
            ),
            Err(e) => (None, e.kind().to_string()),
        };
        // Auditing is best-effort.
        let _ = self.audit.record(&AuditEntry::new(requester, target, outcome));

        result.map(|(_, response)| response)
    }

    async fn process(
        &self,
        requester: &str,
        raw_payload: Option<&Value>,
    ) -> Result<(Option<String>, ExchangeResponse), ExchangeError> {
        if requester.is_empty() {
            return Err(ExchangeError::Authorization("requesterName is required".into()));
        }
        if !self.client.registry().is_allowed(requester) {
            tracing::warn!(requester = %requester, "Exchange from unauthorized requester");
            return Err(ExchangeError::Authorization(format!(
                "requester '{}' is not authorized",
                requester
            )));
        }

        let mut payload = parse_payload(raw_payload).map_err(|e| ExchangeError::Validation(e.to_string()))?;

        if let Some(key) = find_forbidden_key(&Value::Object(payload.clone())) {
            tracing::warn!(requester = %requester, key = %key, "Rejected raw query payload");
            return Err(ExchangeError::Validation(format!(
                "raw queries are not accepted (field '{}')",
                key
            )));
        }
        let selection = self.whitelist.selection(&payload).map_err(ExchangeError::Validation)?;

        let target = match payload.remove(TARGET_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if name.trim().is_empty() => None,
            Some(Value::String(name)) => Some(name.trim().to_string()),
            Some(_) => return Err(ExchangeError::Validation(format!("'{}' must be a string", TARGET_KEY))),
        };

        match target {
            Some(name) if !name.eq_ignore_ascii_case(&self.service_name) => {
                let response = self.forward(requester, &name, &payload).await?;
                Ok((Some(name), response))
            }
            _ => {
                let filters = identifying_fields(&payload, &self.echo_fields);
                let mut answer = self.local.select(&selection, &filters, &self.whitelist);
                for (k, v) in filters {
                    answer.entry(k).or_insert(v);
                }
                tracing::debug!(requester = %requester, resources = ?selection.resources(), "Answered locally");
                Ok((
                    None,
                    ExchangeResponse {
                        success: true,
                        service_name: self.service_name.clone(),
                        payload: encode_payload(&answer),
                        source: None,
                        timestamp: Utc::now(),
                    },
                ))
            }
        }
    }

    async fn forward(
        &self,
        requester: &str,
        target: &str,
        payload: &Document,
    ) -> Result<ExchangeResponse, ExchangeError> {
        if self.client.registry().resolve(target).is_none() {
            return Err(ExchangeError::UnknownTarget(format!(
                "service '{}' is unknown or not configured for exchange",
                target
            )));
        }

        tracing::debug!(requester = %requester, target = %target, "Forwarding exchange");
        let result = self.client.call(target, payload).await.map_err(|e| match e {
            IntegrationError::PeerRejected { peer, status } => ExchangeError::PeerRejected { peer, status },
        })?;

        Ok(ExchangeResponse {
            success: true,
            service_name: result.peer_name,
            payload: result.payload.to_string(),
            source: Some(result.provenance.as_str().to_string()),
            timestamp: result.timestamp,
        })
    }
}
