//! Server-side host records
//!
//! A `HostRecord` is the latest snapshot accepted for a hostname plus derived
//! metrics and bookkeeping. Metrics are never stored independently of the
//! check results: every construction path, deserialization included,
//! recomputes them.

use crate::snapshot::{HostIdentity, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// round(passed / total * 100), 0 when there are no checks
pub fn compliance_score(passed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let score = (passed.min(total) as f64 / total as f64 * 100.0).round();
    score as u8
}

/// Metrics derived from a snapshot's check results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetrics {
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub indeterminate_checks: usize,
    pub total_packages: usize,
    pub compliance_score: u8,
}

impl HostMetrics {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let tally = snapshot.tally();
        Self {
            total_checks: snapshot.check_results.len(),
            passed_checks: tally.passed,
            failed_checks: tally.failed,
            indeterminate_checks: tally.indeterminate,
            total_packages: snapshot.packages.len(),
            compliance_score: compliance_score(tally.passed, snapshot.check_results.len()),
        }
    }
}

/// Ingestion bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub last_source_address: Option<String>,
    pub ingested_at: DateTime<Utc>,
    /// Agent version reported by the accepted snapshot
    #[serde(default)]
    pub agent_version: String,
}

/// Latest known state of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredHostRecord")]
pub struct HostRecord {
    snapshot: Snapshot,
    metrics: HostMetrics,
    metadata: HostMetadata,
}

/// Wire/store representation; metrics are accepted but ignored
#[derive(Deserialize)]
struct StoredHostRecord {
    snapshot: Snapshot,
    #[serde(default)]
    #[allow(dead_code)]
    metrics: Option<HostMetrics>,
    metadata: HostMetadata,
}

impl From<StoredHostRecord> for HostRecord {
    fn from(stored: StoredHostRecord) -> Self {
        HostRecord::new(stored.snapshot, stored.metadata)
    }
}

impl HostRecord {
    pub fn new(snapshot: Snapshot, metadata: HostMetadata) -> Self {
        let metrics = HostMetrics::from_snapshot(&snapshot);
        Self {
            snapshot,
            metrics,
            metadata,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.snapshot.identity.hostname
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.snapshot.identity
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn metrics(&self) -> &HostMetrics {
        &self.metrics
    }

    pub fn metadata(&self) -> &HostMetadata {
        &self.metadata
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            hostname: self.hostname().to_string(),
            os_family: self.snapshot.identity.os_family.clone(),
            os_version: self.snapshot.identity.os_version.clone(),
            compliance_score: self.metrics.compliance_score,
            total_checks: self.metrics.total_checks,
            passed_checks: self.metrics.passed_checks,
            total_packages: self.metrics.total_packages,
            last_seen_at: self.metadata.last_seen_at,
            last_source_address: self.metadata.last_source_address.clone(),
            agent_version: self.metadata.agent_version.clone(),
        }
    }
}

/// Row in the host listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub hostname: String,
    pub os_family: String,
    pub os_version: String,
    pub compliance_score: u8,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub total_packages: usize,
    pub last_seen_at: DateTime<Utc>,
    pub last_source_address: Option<String>,
    pub agent_version: String,
}
