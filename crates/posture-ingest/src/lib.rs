//! Posture Ingest - server-side snapshot ingestion and fleet aggregation
//!
//! This crate provides:
//! - `HostStore`: the durable store contract with an in-memory implementation
//! - `Normalizer`: validates snapshots and applies them with compare-and-upsert
//! - `FleetAggregator`: per-check pass/fail breakdown across all hosts
//!
//! # Example
//!
//! ```no_run
//! use posture_ingest::{FleetAggregator, HostStore, InMemoryStore, Normalizer};
//! use std::sync::Arc;
//!
//! # async fn run(snapshot: posture_core::Snapshot) -> anyhow::Result<()> {
//! let store: Arc<dyn HostStore> = Arc::new(InMemoryStore::new());
//! let normalizer = Normalizer::new(Arc::clone(&store));
//!
//! let record = normalizer.ingest(snapshot).await?;
//! println!("{} scored {}", record.hostname(), record.metrics().compliance_score);
//!
//! let report = FleetAggregator::new(store).aggregate().await?;
//! for check in &report.checks {
//!     println!("{}: {:.0}%", check.check_id, check.pass_rate * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod normalize;
pub mod store;

pub use aggregate::{
    aggregate_records, CheckBreakdown, FailingHost, FleetAggregator, FleetReport, FleetSummary,
};
pub use normalize::{IngestError, IngestOutcome, IngestStatus, Normalizer};
pub use store::{HostStore, InMemoryStore, StoreError, UpsertOutcome};
