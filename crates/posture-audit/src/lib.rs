//! Posture Audit - local evidence collection (agent side)
//!
//! This crate turns the local host into a `Snapshot`:
//! - `Prober`: runs evidence probes (files, commands, services, executables)
//! - `Auditor`: evaluates checks concurrently with a bounded worker pool
//! - `PackageCollector`: detects dpkg / rpm / apk and lists installed packages
//! - `IdentityResolver`: hostname, OS family/version and architecture
//! - `SnapshotBuilder`: ties the above together into one collection run
//!
//! # Example
//!
//! ```no_run
//! use posture_audit::SnapshotBuilder;
//! use posture_checks::CheckRegistry;
//! use posture_common::Config;
//!
//! # async fn run() -> posture_core::Result<()> {
//! let registry = CheckRegistry::with_builtin();
//! let builder = SnapshotBuilder::from_config(&Config::default());
//!
//! let snapshot = builder.build(registry.enabled_by_default()).await?;
//! for failure in snapshot.failures() {
//!     println!("{}: {}", failure.check_id, failure.verdict.detail);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auditor;
pub mod builder;
pub mod identity;
pub mod packages;
pub mod probe;

pub use auditor::{AuditResult, AuditSummary, Auditor};
pub use builder::SnapshotBuilder;
pub use identity::{parse_os_release, IdentityResolver};
pub use packages::{listing_command, parse_listing, PackageCollector};
pub use probe::{find_on_path, Prober, SystemProber};
