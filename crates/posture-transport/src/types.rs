//! Wire types shared by the agent client and the ingest server

use serde::{Deserialize, Serialize};

/// Hex SHA-256 of the request body
pub const SNAPSHOT_DIGEST_HEADER: &str = "x-snapshot-sha256";

/// Shared API key
pub const API_KEY_HEADER: &str = "x-api-key";

pub const INGEST_PATH: &str = "/api/v1/ingest";
pub const HOSTS_PATH: &str = "/api/v1/hosts";
pub const FLEET_REPORT_PATH: &str = "/api/v1/fleet/report";
pub const HEALTH_PATH: &str = "/health";

/// Response to a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAck {
    pub hostname: String,
    pub compliance_score: u8,
    /// `created`, `updated` or `stale`
    pub status: String,
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable reason code, e.g. `MISSING_HOSTNAME`
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Health probe response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
