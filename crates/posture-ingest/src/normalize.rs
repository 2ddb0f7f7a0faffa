//! Snapshot ingestion: validation, metrics and the compare-and-upsert loop

use crate::store::{HostStore, StoreError, UpsertOutcome};
use chrono::Utc;
use posture_core::{HostMetadata, HostRecord, HostSummary, Snapshot};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Snapshot has no hostname")]
    MissingHostname,

    #[error("Snapshot reports check {check_id} more than once")]
    DuplicateCheckResult { check_id: String },

    #[error("Could not apply snapshot for {hostname} after {attempts} attempts")]
    Conflict { hostname: String, attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::MissingHostname => "MISSING_HOSTNAME",
            IngestError::DuplicateCheckResult { .. } => "DUPLICATE_CHECK_RESULT",
            IngestError::Conflict { .. } => "INGEST_CONFLICT",
            IngestError::Store(_) => "STORE_ERROR",
        }
    }

    /// Rejected because of the payload itself; never partially applied
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IngestError::MissingHostname | IngestError::DuplicateCheckResult { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Conflict { .. } => true,
            IngestError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// What an ingestion did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Created,
    Updated,
    /// Delivered out of order; stored record left unchanged
    Stale,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Created => "created",
            IngestStatus::Updated => "updated",
            IngestStatus::Stale => "stale",
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record as stored after an ingestion, with what happened
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub record: HostRecord,
    pub status: IngestStatus,
}

/// Validates snapshots and folds them into the host store
pub struct Normalizer {
    store: Arc<dyn HostStore>,
    max_attempts: usize,
}

impl Normalizer {
    pub fn new(store: Arc<dyn HostStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound on compare-and-upsert retries
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn HostStore> {
        &self.store
    }

    /// Ingest a snapshot with no known source address
    pub async fn ingest(&self, snapshot: Snapshot) -> Result<HostRecord, IngestError> {
        self.ingest_with_status(snapshot, None)
            .await
            .map(|outcome| outcome.record)
    }

    /// Ingest a snapshot delivered from `source`
    pub async fn ingest_from(
        &self,
        snapshot: Snapshot,
        source: impl Into<String>,
    ) -> Result<HostRecord, IngestError> {
        self.ingest_with_status(snapshot, Some(source.into()))
            .await
            .map(|outcome| outcome.record)
    }

    /// Ingest and report whether the record was created, updated or stale
    pub async fn ingest_with_status(
        &self,
        mut snapshot: Snapshot,
        source: Option<String>,
    ) -> Result<IngestOutcome, IngestError> {
        validate(&mut snapshot)?;
        let hostname = snapshot.identity.hostname.clone();
        let collected_at = snapshot.collected_at;

        for attempt in 1..=self.max_attempts {
            let existing = self.store.get(&hostname).await?;
            let expected_first_seen = existing.as_ref().map(|r| r.metadata().first_seen_at);

            let metadata = HostMetadata {
                first_seen_at: expected_first_seen.unwrap_or(collected_at),
                last_seen_at: collected_at,
                last_source_address: source.clone(),
                ingested_at: Utc::now(),
                agent_version: snapshot.agent_version.clone(),
            };
            let record = HostRecord::new(snapshot.clone(), metadata);

            match self
                .store
                .upsert_if_newer(record.clone(), expected_first_seen)
                .await?
            {
                UpsertOutcome::Applied { created } => {
                    let status = if created {
                        IngestStatus::Created
                    } else {
                        IngestStatus::Updated
                    };
                    info!(
                        hostname = %hostname,
                        status = %status,
                        score = record.metrics().compliance_score,
                        checks = record.metrics().total_checks,
                        "Snapshot ingested"
                    );
                    return Ok(IngestOutcome { record, status });
                }
                UpsertOutcome::Stale { current } => {
                    warn!(
                        "Ignoring stale snapshot for {} collected at {} (stored {})",
                        hostname,
                        collected_at,
                        current.metadata().last_seen_at
                    );
                    return Ok(IngestOutcome {
                        record: current,
                        status: IngestStatus::Stale,
                    });
                }
                UpsertOutcome::Conflict => {
                    debug!("Upsert conflict for {} (attempt {})", hostname, attempt);
                }
            }
        }

        Err(IngestError::Conflict {
            hostname,
            attempts: self.max_attempts,
        })
    }

    /// Latest record for a hostname; unknown hosts are `None`
    pub async fn host(&self, hostname: &str) -> Result<Option<HostRecord>, IngestError> {
        Ok(self.store.get(hostname.trim()).await?)
    }

    /// Summary of every known host, sorted by hostname
    pub async fn hosts(&self) -> Result<Vec<HostSummary>, IngestError> {
        let mut summaries: Vec<HostSummary> = self
            .store
            .scan_all()
            .await?
            .iter()
            .map(HostRecord::summary)
            .collect();
        summaries.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(summaries)
    }
}

fn validate(snapshot: &mut Snapshot) -> Result<(), IngestError> {
    let hostname = snapshot.identity.hostname.trim();
    if hostname.is_empty() {
        return Err(IngestError::MissingHostname);
    }
    snapshot.identity.hostname = hostname.to_string();

    let mut seen = HashSet::new();
    for outcome in &snapshot.check_results {
        if !seen.insert(outcome.check_id.as_str()) {
            return Err(IngestError::DuplicateCheckResult {
                check_id: outcome.check_id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone};
    use posture_core::{CheckOutcome, HostIdentity, Verdict};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    fn snapshot(host: &str, collected_at: DateTime<Utc>, pass: usize, fail: usize, unknown: usize) -> Snapshot {
        let mut snap = Snapshot::new(HostIdentity::new(host).with_os("debian", "12"), collected_at);
        for i in 0..pass {
            snap = snap.with_result(CheckOutcome::new(format!("p{}", i), Verdict::pass("ok", "")));
        }
        for i in 0..fail {
            snap = snap.with_result(CheckOutcome::new(format!("f{}", i), Verdict::fail("bad", "")));
        }
        for i in 0..unknown {
            snap = snap.with_result(CheckOutcome::new(format!("u{}", i), Verdict::indeterminate("n/a")));
        }
        snap
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_first_ingest_computes_metrics() {
        let n = normalizer();
        let outcome = n
            .ingest_with_status(snapshot("h1", at(0), 8, 1, 1), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, IngestStatus::Created);
        let metrics = outcome.record.metrics();
        assert_eq!(metrics.total_checks, 10);
        assert_eq!(metrics.compliance_score, 80);
        assert_eq!(outcome.record.metadata().first_seen_at, at(0));
        assert_eq!(outcome.record.metadata().last_seen_at, at(0));
    }

    #[tokio::test]
    async fn test_update_keeps_first_seen() {
        let n = normalizer();
        n.ingest(snapshot("h1", at(0), 1, 0, 0)).await.unwrap();
        let record = n
            .ingest_from(snapshot("h1", at(10), 0, 1, 0), "10.0.0.5")
            .await
            .unwrap();

        assert_eq!(record.metadata().first_seen_at, at(0));
        assert_eq!(record.metadata().last_seen_at, at(10));
        assert_eq!(record.metadata().last_source_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(record.metrics().compliance_score, 0);
    }

    #[tokio::test]
    async fn test_stale_ingest_leaves_record_unchanged() {
        let n = normalizer();
        let stored = n.ingest(snapshot("h1", at(10), 2, 0, 0)).await.unwrap();

        let outcome = n
            .ingest_with_status(snapshot("h1", at(5), 0, 2, 0), None)
            .await
            .unwrap();

        assert_eq!(outcome.status, IngestStatus::Stale);
        assert_eq!(outcome.record, stored);
        assert_eq!(n.host("h1").await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn test_equal_timestamp_is_applied() {
        let n = normalizer();
        n.ingest(snapshot("h1", at(10), 2, 0, 0)).await.unwrap();
        let outcome = n
            .ingest_with_status(snapshot("h1", at(10), 0, 2, 0), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, IngestStatus::Updated);
        assert_eq!(outcome.record.metrics().failed_checks, 2);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let n = normalizer();

        let err = n.ingest(snapshot("   ", at(0), 1, 0, 0)).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_HOSTNAME");
        assert!(err.is_validation());

        let dup = snapshot("h1", at(0), 0, 0, 0)
            .with_result(CheckOutcome::new("ssh", Verdict::pass("", "")))
            .with_result(CheckOutcome::new("ssh", Verdict::fail("", "")));
        let err = n.ingest(dup).await.unwrap_err();
        assert!(matches!(err, IngestError::DuplicateCheckResult { ref check_id } if check_id == "ssh"));

        assert!(n.hosts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hostname_trimmed_and_zero_checks() {
        let n = normalizer();
        let record = n.ingest(snapshot("  web-01\n", at(0), 0, 0, 0)).await.unwrap();
        assert_eq!(record.hostname(), "web-01");
        assert_eq!(record.metrics().compliance_score, 0);
        assert!(n.host(" web-01 ").await.unwrap().is_some());
        assert!(n.host("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hosts_sorted() {
        let n = normalizer();
        for host in ["zeta", "alpha", "mid"] {
            n.ingest(snapshot(host, at(0), 1, 1, 0)).await.unwrap();
        }
        let names: Vec<String> = n.hosts().await.unwrap().into_iter().map(|h| h.hostname).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_summary_carries_agent_version_and_source() {
        let n = normalizer();
        n.ingest_from(snapshot("h1", at(0), 1, 0, 0).with_agent_version("1.4.2"), "10.0.0.7")
            .await
            .unwrap();

        let record = n.host("h1").await.unwrap().unwrap();
        assert_eq!(record.metadata().agent_version, "1.4.2");

        let summary = &n.hosts().await.unwrap()[0];
        assert_eq!(summary.agent_version, "1.4.2");
        assert_eq!(summary.last_source_address.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_wire_duplicate_packages_counted_once() {
        let json = r#"{
            "identity": {"hostname": "h1"},
            "package_manager": "dpkg",
            "packages": [
                {"name": "bash", "version": "5.1"},
                {"name": "bash", "version": "5.2"}
            ],
            "collected_at": "2024-05-01T10:00:00Z"
        }"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();

        let record = normalizer().ingest(snap).await.unwrap();
        assert_eq!(record.metrics().total_packages, 1);
        assert_eq!(record.snapshot().packages.get("bash").unwrap().version, "5.2");
    }

    struct AlwaysConflict;

    #[async_trait]
    impl HostStore for AlwaysConflict {
        async fn get(&self, _hostname: &str) -> Result<Option<HostRecord>, StoreError> {
            Ok(None)
        }

        async fn upsert_if_newer(
            &self,
            _record: HostRecord,
            _expected: Option<DateTime<Utc>>,
        ) -> Result<UpsertOutcome, StoreError> {
            Ok(UpsertOutcome::Conflict)
        }

        async fn scan_all(&self) -> Result<Vec<HostRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let n = Normalizer::new(Arc::new(AlwaysConflict)).with_max_attempts(3);
        let err = n.ingest(snapshot("h1", at(0), 1, 0, 0)).await.unwrap_err();
        assert!(matches!(err, IngestError::Conflict { attempts: 3, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_concurrent_first_ingest_single_first_seen() {
        let n = Arc::new(normalizer());
        let mut handles = Vec::new();
        for i in 0..8 {
            let n = Arc::clone(&n);
            handles.push(tokio::spawn(async move {
                n.ingest(snapshot("race", at(0) + Duration::seconds(i), 1, 0, 0))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = n.host("race").await.unwrap().unwrap();
        assert_eq!(record.metadata().last_seen_at, at(0) + Duration::seconds(7));
        assert!(record.metadata().first_seen_at <= at(0) + Duration::seconds(7));
    }
}
