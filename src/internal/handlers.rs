use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::http::server::AppState;
use crate::internal::error::InternalError;
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service_name: String,
    pub uptime_secs: u64,
    pub peers: Vec<PeerStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerStatus {
    pub name: String,
    pub configured: bool,
    pub exchange_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    pub success: bool,
    pub resource: &'static str,
    pub id: String,
    pub count: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let peers = state
        .client
        .registry()
        .peers()
        .into_iter()
        .map(|p| PeerStatus {
            name: p.name.clone(),
            configured: p.is_configured(),
            exchange_url: p.exchange_url(),
        })
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service_name: state.config.service.name.clone(),
        uptime_secs: state.started.elapsed().as_secs(),
        peers,
    })
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.client.breakers().snapshots())
}

/// Store a record pushed by a peer.
pub async fn push_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(record): Json<Value>,
) -> Result<Json<PushAck>, InternalError> {
    let canonical = state
        .handler
        .whitelist()
        .resource(&resource)
        .ok_or_else(|| InternalError::UnknownResource(resource.clone()))?;

    let record = match record {
        Value::Object(map) => map,
        _ => return Err(InternalError::BadRecord("record must be a JSON object".into())),
    };
    let id = state
        .local
        .upsert(canonical, record)
        .map_err(|e| InternalError::BadRecord(e.to_string()))?;

    tracing::info!(resource = canonical, id = %id, "Stored pushed record");
    Ok(Json(PushAck {
        success: true,
        resource: canonical,
        id,
        count: state.local.count(canonical),
    }))
}
