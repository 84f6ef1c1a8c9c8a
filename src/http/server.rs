//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every hub component from one resolved `HubConfig`
//! - Create the Axum Router with exchange, health and internal routes
//! - Wire up middleware (tracing, limits, request ID, timeouts)
//! - Serve until a signal or an explicit shutdown arrives

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::{HttpTransport, IntegrationClient, PeerTransport};
use crate::config::HubConfig;
use crate::exchange::envelope::InboundEnvelope;
use crate::exchange::error::ExchangeError;
use crate::exchange::handler::ExchangeHandler;
use crate::exchange::local::{InMemoryDirectory, LocalDataSource};
use crate::fallback::FallbackProvider;
use crate::internal::setup_internal_router;
use crate::lifecycle::shutdown_signal;
use crate::observability::audit::{AuditSink, JsonLinesAuditSink, TracingAuditSink};
use crate::observability::metrics;
use crate::registry::ServiceRegistry;
use crate::resilience::CircuitBreakerRegistry;
use crate::security::{rate_limit_middleware, RateLimiterState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HubConfig>,
    pub handler: Arc<ExchangeHandler>,
    pub client: Arc<IntegrationClient>,
    pub local: Arc<dyn LocalDataSource>,
    pub started: Instant,
}

/// HTTP server for the exchange hub.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server talking to peers over HTTP.
    pub fn new(config: HubConfig) -> Self {
        let http = reqwest::Client::new();
        let transport = Arc::new(HttpTransport::new(http.clone()));
        Self::with_transport(config, transport, http)
    }

    /// Create a server with a custom peer transport.
    pub fn with_transport(config: HubConfig, transport: Arc<dyn PeerTransport>, http: reqwest::Client) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(ServiceRegistry::from_config(&config));
        let breakers = Arc::new(CircuitBreakerRegistry::from_config(&config.circuit_breaker));
        let fallback = Arc::new(FallbackProvider::new(&config.fallback, http));
        let client = Arc::new(IntegrationClient::new(
            registry,
            breakers,
            fallback,
            transport,
            config.service.requester(),
            Duration::from_secs(config.timeouts.request_secs),
        ));

        let local: Arc<dyn LocalDataSource> = Arc::new(InMemoryDirectory::new());
        let handler = Arc::new(
            ExchangeHandler::new(config.service.name.clone(), client.clone(), local.clone(), audit_sink(&config))
                .with_echo_fields(config.fallback.echo_fields.clone()),
        );

        let state = AppState {
            config: config.clone(),
            handler,
            client,
            local,
            started: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HubConfig, state: AppState) -> Router {
        let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));

        let exchange = Router::new()
            .route("/exchange", post(exchange_handler))
            .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .with_state(state.clone());

        Router::new()
            .route("/health", get(health_handler))
            .with_state(state.clone())
            .merge(exchange)
            .merge(setup_internal_router(state))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.inbound_secs)))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Shared state, for embedding and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &HubConfig {
        &self.state.config
    }

    /// Run the server until Ctrl-C, SIGTERM or a broadcast on `shutdown`.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.state.config.service.name,
            peers = self.state.client.registry().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {},
                    _ = shutdown.recv() => tracing::info!("Shutdown requested"),
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn audit_sink(config: &HubConfig) -> Arc<dyn AuditSink> {
    match &config.observability.audit_log {
        Some(path) => match JsonLinesAuditSink::open(path) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Audit log unavailable; auditing to tracing");
                Arc::new(TracingAuditSink)
            }
        },
        None => Arc::new(TracingAuditSink),
    }
}

/// `POST /exchange`.
///
/// The body is decoded by hand so a malformed envelope gets the same
/// error shape as every other rejection.
async fn exchange_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope: InboundEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let err = ExchangeError::Validation(format!("malformed envelope: {}", e));
            metrics::record_exchange(err.kind());
            return err.into_response();
        }
    };

    match state.handler.handle(envelope).await {
        Ok(response) => {
            metrics::record_exchange("ok");
            Json(response).into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, status = e.status(), "Exchange rejected");
            metrics::record_exchange(e.kind());
            e.into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": state.config.service.name,
    }))
}
