//! Posture Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions shared by the agent and the backend:
//! - `Check`: The trait every posture check implements
//! - `ProbeSpec` / `ProbeResult`: The evidence probe contract
//! - `Verdict`: Three-way Pass / Fail / Indeterminate outcome
//! - `Snapshot`: One point-in-time bundle of a host's posture
//! - `HostRecord`: The durable latest-known state for one host

pub mod check;
pub mod error;
pub mod probe;
pub mod record;
pub mod snapshot;
pub mod verdict;

// Re-export commonly used types at crate root
pub use check::{Check, CheckMetadata};
pub use error::{Error, Result};
pub use probe::{Evidence, ProbeError, ProbeResult, ProbeSpec};
pub use record::{compliance_score, HostMetadata, HostMetrics, HostRecord, HostSummary};
pub use snapshot::{
    CheckOutcome, HostIdentity, PackageInventory, PackageManager, PackageRecord, Snapshot,
};
pub use verdict::{Verdict, VerdictStatus, VerdictTally};
