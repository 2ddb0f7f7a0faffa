//! HTTP ingest server
//!
//! Routes:
//! - POST   /api/v1/ingest              - Submit a snapshot
//! - GET    /api/v1/hosts               - Host listing
//! - GET    /api/v1/hosts/{hostname}    - Latest record for one host
//! - GET    /api/v1/fleet/report        - Fleet aggregation
//! - GET    /health                     - Liveness (no API key)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequest, Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use posture_common::digest::verify_sha256;
use posture_core::{HostRecord, HostSummary, Snapshot};
use posture_ingest::{
    FleetAggregator, FleetReport, HostStore, IngestError, Normalizer, StoreError,
};

use crate::types::*;

/// Largest accepted snapshot body
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid snapshot payload: {0}")]
    InvalidPayload(String),

    #[error("Snapshot body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Snapshot digest does not match body")]
    DigestMismatch,

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Unknown host: {0}")]
    HostNotFound(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::DigestMismatch => "DIGEST_MISMATCH",
            ServerError::Unauthorized => "UNAUTHORIZED",
            ServerError::HostNotFound(_) => "HOST_NOT_FOUND",
            ServerError::Ingest(e) => e.code(),
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Io(_) => "IO_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidPayload(_) | ServerError::DigestMismatch => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::HostNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Ingest(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ServerError::Ingest(IngestError::Conflict { .. }) => StatusCode::CONFLICT,
            ServerError::Ingest(_) | ServerError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }
        (status, Json(ErrorBody::new(self.code(), self.to_string()))).into_response()
    }
}

// ── State ────────────────────────────────────────────────────────────────────

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    normalizer: Arc<Normalizer>,
    aggregator: Arc<FleetAggregator>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Arc<dyn HostStore>) -> Self {
        Self {
            normalizer: Arc::new(Normalizer::new(Arc::clone(&store))),
            aggregator: Arc::new(FleetAggregator::new(store)),
            api_key: None,
        }
    }

    /// Require this key on every route except /health; empty keys are ignored
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    /// Replace the normalizer (e.g. to change the retry bound)
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(
            INGEST_PATH,
            post(ingest).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route(HOSTS_PATH, get(list_hosts))
        .route("/api/v1/hosts/{hostname}", get(get_host))
        .route(FLEET_REPORT_PATH, get(fleet_report))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Ingest server listening on {}", addr);
    }
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("Ingest server stopped");
    Ok(())
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };
    if req.uri().path() == HEALTH_PATH {
        return Ok(next.run(req).await);
    }

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        warn!("Rejected request to {} without a valid API key", req.uri().path());
        return Err(ServerError::Unauthorized);
    }
    Ok(next.run(req).await)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::default())
}

async fn ingest(State(state): State<AppState>, req: Request) -> Result<Json<IngestAck>, ServerError> {
    let source = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let digest = header_value(req.headers(), SNAPSHOT_DIGEST_HEADER);

    let body = Bytes::from_request(req, &state).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(MAX_BODY_BYTES)
        } else {
            ServerError::InvalidPayload(rejection.body_text())
        }
    })?;

    if let Some(expected) = digest {
        if !verify_sha256(&body, &expected) {
            return Err(ServerError::DigestMismatch);
        }
    }

    let snapshot: Snapshot =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidPayload(e.to_string()))?;

    let outcome = state.normalizer.ingest_with_status(snapshot, source).await?;
    Ok(Json(IngestAck {
        hostname: outcome.record.hostname().to_string(),
        compliance_score: outcome.record.metrics().compliance_score,
        status: outcome.status.to_string(),
    }))
}

async fn list_hosts(State(state): State<AppState>) -> Result<Json<Vec<HostSummary>>, ServerError> {
    Ok(Json(state.normalizer.hosts().await?))
}

async fn get_host(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
) -> Result<Json<HostRecord>, ServerError> {
    state
        .normalizer
        .host(&hostname)
        .await?
        .map(Json)
        .ok_or(ServerError::HostNotFound(hostname))
}

async fn fleet_report(State(state): State<AppState>) -> Result<Json<FleetReport>, ServerError> {
    Ok(Json(state.aggregator.aggregate().await?))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
