//! REST client used by the agent to deliver snapshots
//!
//! API endpoints used:
//! - POST   /api/v1/ingest      - Submit a snapshot
//! - GET    /health             - Reachability check
//!

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use posture_common::config::AgentConfig;
use posture_common::digest::sha256_hex;
use posture_core::Snapshot;

use crate::types::*;

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for the snapshot client
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Server base URL (e.g., "https://posture.example.internal:8080")
    pub endpoint: String,
    /// Shared API key, sent as `X-Api-Key` when set
    pub api_key: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Total delivery attempts, first one included
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each time
    pub initial_backoff: Duration,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://localhost:8080"),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RestClientConfig {
    pub fn from_agent(agent: &AgentConfig) -> Self {
        Self {
            endpoint: agent.endpoint.clone(),
            api_key: agent.api_key.clone().filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(agent.request_timeout_seconds.max(1)),
            max_attempts: agent.submit_attempts.max(1),
            ..Default::default()
        }
    }
}

// ── Client Errors ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RestClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl RestClientError {
    /// Transport failures and server-side errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            RestClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RestClientError::Api { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            _ => false,
        }
    }
}

// ── REST API Client ──────────────────────────────────────────────────────────

/// Delivers snapshots to the ingest server
pub struct SnapshotClient {
    config: RestClientConfig,
    http: Client,
}

impl SnapshotClient {
    /// Create a new client
    pub fn new(config: RestClientConfig) -> Result<Self, RestClientError> {
        if config.endpoint.trim().is_empty() {
            return Err(RestClientError::NotConfigured("endpoint is required".into()));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("posture-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Submit a snapshot, retrying transient failures with exponential backoff
    pub async fn submit(&self, snapshot: &Snapshot) -> Result<IngestAck, RestClientError> {
        let body = serde_json::to_vec(snapshot)?;
        let digest = sha256_hex(&body);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.post_once(&body, &digest).await {
                Ok(ack) => {
                    info!(
                        "Snapshot for {} accepted ({}, score {})",
                        ack.hostname, ack.status, ack.compliance_score
                    );
                    return Ok(ack);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(
                        "Snapshot delivery attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.config.max_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, body: &[u8], digest: &str) -> Result<IngestAck, RestClientError> {
        let mut request = self
            .http
            .post(self.url(INGEST_PATH))
            .header("content-type", "application/json")
            .header(SNAPSHOT_DIGEST_HEADER, digest)
            .body(body.to_vec());
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }

        debug!("Ingest responded {}", res.status());
        Ok(res.json().await?)
    }

    /// Check that the server is reachable
    pub async fn health(&self) -> Result<HealthStatus, RestClientError> {
        let res = self.http.get(self.url(HEALTH_PATH)).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }
}

async fn api_error(res: reqwest::Response) -> RestClientError {
    let status = res.status().as_u16();
    let text = res.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => RestClientError::Api {
            status,
            code: body.code,
            message: body.message,
        },
        Err(_) => RestClientError::Api {
            status,
            code: "HTTP_ERROR".into(),
            message: text,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{build_router, AppState};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use chrono::Utc;
    use posture_core::{CheckOutcome, HostIdentity, Verdict};
    use posture_ingest::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(endpoint: String, api_key: Option<&str>, attempts: u32) -> SnapshotClient {
        SnapshotClient::new(RestClientConfig {
            endpoint,
            api_key: api_key.map(String::from),
            max_attempts: attempts,
            initial_backoff: Duration::from_millis(10),
            ..Default::default()
        })
        .unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(HostIdentity::new("web-01"), Utc::now())
            .with_result(CheckOutcome::new("ssh-root-login", Verdict::pass("", "")))
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = SnapshotClient::new(RestClientConfig {
            endpoint: "  ".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(RestClientError::NotConfigured(_))));
    }

    #[test]
    fn test_retry_classification() {
        let server = RestClientError::Api {
            status: 503,
            code: "STORE_ERROR".into(),
            message: String::new(),
        };
        let client = RestClientError::Api {
            status: 400,
            code: "MISSING_HOSTNAME".into(),
            message: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[tokio::test]
    async fn test_submit_to_server() {
        let state = AppState::new(Arc::new(InMemoryStore::new())).with_api_key(Some("k".into()));
        let endpoint = spawn(build_router(state)).await;

        let c = client(endpoint.clone(), Some("k"), 1);
        let ack = c.submit(&snapshot()).await.unwrap();
        assert_eq!(ack.hostname, "web-01");
        assert_eq!(ack.compliance_score, 100);
        assert_eq!(ack.status, "created");
        assert_eq!(c.health().await.unwrap().status, "ok");

        let err = client(endpoint, None, 3).submit(&snapshot()).await.unwrap_err();
        match err {
            RestClientError::Api { status, code, .. } => {
                assert_eq!(status, 401);
                assert_eq!(code, "UNAUTHORIZED");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            INGEST_PATH,
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (AxumStatus::SERVICE_UNAVAILABLE, "busy").into_response()
                    } else {
                        axum::Json(IngestAck {
                            hostname: "web-01".into(),
                            compliance_score: 100,
                            status: "created".into(),
                        })
                        .into_response()
                    }
                }
            }),
        );
        let endpoint = spawn(router).await;

        let ack = client(endpoint, None, 3).submit(&snapshot()).await.unwrap();
        assert_eq!(ack.status, "created");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            INGEST_PATH,
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { AxumStatus::INTERNAL_SERVER_ERROR }
            }),
        );
        let endpoint = spawn(router).await;

        let err = client(endpoint, None, 2).submit(&snapshot()).await.unwrap_err();
        assert!(matches!(err, RestClientError::Api { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
