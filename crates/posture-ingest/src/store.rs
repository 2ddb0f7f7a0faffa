//! Durable host store abstraction and the in-process implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use posture_core::HostRecord;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Store backend failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result of a compare-and-upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was written
    Applied { created: bool },
    /// The stored record is newer; nothing was written
    Stale { current: HostRecord },
    /// The stored state no longer matches what the caller read
    Conflict,
}

/// Keyed storage of the latest record per hostname
///
/// Implementations must apply `upsert_if_newer` atomically: readers observe
/// either the old record or the new one, never a mix.
#[async_trait]
pub trait HostStore: Send + Sync {
    async fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError>;

    /// Write `record` if the stored state still matches `expected_first_seen`
    /// and the record is not older than the stored one.
    ///
    /// `expected_first_seen` is `None` when the caller saw no record.
    async fn upsert_if_newer(
        &self,
        record: HostRecord,
        expected_first_seen: Option<DateTime<Utc>>,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn scan_all(&self) -> Result<Vec<HostRecord>, StoreError>;
}

/// Single-node store backed by a locked map
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, HostRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HostStore for InMemoryStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError> {
        Ok(self.records.read().await.get(hostname).cloned())
    }

    async fn upsert_if_newer(
        &self,
        record: HostRecord,
        expected_first_seen: Option<DateTime<Utc>>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().await;

        match (records.get(record.hostname()), expected_first_seen) {
            (None, None) => {
                records.insert(record.hostname().to_string(), record);
                Ok(UpsertOutcome::Applied { created: true })
            }
            (None, Some(_)) | (Some(_), None) => Ok(UpsertOutcome::Conflict),
            (Some(current), Some(expected)) => {
                if current.metadata().first_seen_at != expected {
                    return Ok(UpsertOutcome::Conflict);
                }
                if record.metadata().last_seen_at < current.metadata().last_seen_at {
                    return Ok(UpsertOutcome::Stale {
                        current: current.clone(),
                    });
                }
                records.insert(record.hostname().to_string(), record);
                Ok(UpsertOutcome::Applied { created: false })
            }
        }
    }

    async fn scan_all(&self) -> Result<Vec<HostRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
