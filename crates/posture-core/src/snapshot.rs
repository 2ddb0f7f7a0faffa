//! Snapshot definitions - the unit the agent collects and the server ingests

use crate::verdict::{Verdict, VerdictStatus, VerdictTally};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who the host is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    /// Primary key on the server side; blank is rejected at ingestion
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub os_family: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub architecture: String,
}

impl HostIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    pub fn with_os(mut self, family: impl Into<String>, version: impl Into<String>) -> Self {
        self.os_family = family.into();
        self.os_version = version.into();
        self
    }

    pub fn with_architecture(mut self, arch: impl Into<String>) -> Self {
        self.architecture = arch.into();
        self
    }
}

/// One installed package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Native package manager the inventory came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Dpkg,
    Rpm,
    Apk,
    /// No supported package manager was detected
    #[default]
    None,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Dpkg => "dpkg",
            PackageManager::Rpm => "rpm",
            PackageManager::Apk => "apk",
            PackageManager::None => "none",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A host's package list, unique by name
///
/// Construction from raw records keeps the last version seen for each name
/// and orders the result by name. Deserialization goes through the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PackageRecord>", into = "Vec<PackageRecord>")]
pub struct PackageInventory(Vec<PackageRecord>);

impl PackageInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = PackageRecord>>(records: I) -> Self {
        let mut by_name: BTreeMap<String, String> = BTreeMap::new();
        for record in records {
            by_name.insert(record.name, record.version);
        }
        Self(
            by_name
                .into_iter()
                .map(|(name, version)| PackageRecord { name, version })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn as_slice(&self) -> &[PackageRecord] {
        &self.0
    }
}

impl From<Vec<PackageRecord>> for PackageInventory {
    fn from(records: Vec<PackageRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<PackageInventory> for Vec<PackageRecord> {
    fn from(inventory: PackageInventory) -> Self {
        inventory.0
    }
}

impl FromIterator<PackageRecord> for PackageInventory {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

/// Result of one check on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reference: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl CheckOutcome {
    pub fn new(check_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            check_id: check_id.into(),
            title: String::new(),
            reference: String::new(),
            verdict,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn status(&self) -> VerdictStatus {
        self.verdict.status
    }
}

/// Point-in-time posture of one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub identity: HostIdentity,

    #[serde(default)]
    pub packages: PackageInventory,

    #[serde(default)]
    pub package_manager: PackageManager,

    #[serde(default)]
    pub check_results: Vec<CheckOutcome>,

    pub collected_at: DateTime<Utc>,

    /// Version of the agent that collected the snapshot
    #[serde(default)]
    pub agent_version: String,
}

impl Snapshot {
    pub fn new(identity: HostIdentity, collected_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            packages: PackageInventory::new(),
            package_manager: PackageManager::None,
            check_results: Vec::new(),
            collected_at,
            agent_version: String::new(),
        }
    }

    pub fn with_agent_version(mut self, version: impl Into<String>) -> Self {
        self.agent_version = version.into();
        self
    }

    pub fn with_packages(mut self, manager: PackageManager, packages: PackageInventory) -> Self {
        self.package_manager = manager;
        self.packages = packages;
        self
    }

    pub fn with_result(mut self, outcome: CheckOutcome) -> Self {
        self.check_results.push(outcome);
        self
    }

    pub fn hostname(&self) -> &str {
        &self.identity.hostname
    }

    /// Count results by status
    pub fn tally(&self) -> VerdictTally {
        self.check_results.iter().map(|r| r.status()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.check_results
            .iter()
            .filter(|r| r.status() == VerdictStatus::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Snapshot {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Snapshot::new(
            HostIdentity::new("web-01")
                .with_os("ubuntu", "22.04")
                .with_architecture("x86_64"),
            at,
        )
        .with_agent_version("0.1.0")
        .with_packages(
            PackageManager::Dpkg,
            PackageInventory::from_records(vec![
                PackageRecord::new("openssl", "3.0.2"),
                PackageRecord::new("bash", "5.1"),
            ]),
        )
        .with_result(
            CheckOutcome::new("ssh-root-login", Verdict::fail("PermitRootLogin yes", "root login allowed"))
                .with_title("SSH root login disabled")
                .with_reference("CIS 5.2.10"),
        )
        .with_result(CheckOutcome::new("auditd", Verdict::indeterminate("systemctl unavailable")))
    }

    #[test]
    fn test_inventory_dedupes_last_wins() {
        let inv = PackageInventory::from_records(vec![
            PackageRecord::new("zlib", "1.2"),
            PackageRecord::new("curl", "7.0"),
            PackageRecord::new("zlib", "1.3"),
        ]);

        assert_eq!(inv.len(), 2);
        assert_eq!(inv.get("zlib").unwrap().version, "1.3");
        assert_eq!(inv.as_slice()[0].name, "curl");
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snap = sample();
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["identity"]["hostname"], "web-01");
        assert_eq!(json["packages"][0]["name"], "bash");
        assert_eq!(json["package_manager"], "dpkg");
        assert_eq!(json["check_results"][0]["check_id"], "ssh-root-login");
        assert_eq!(json["check_results"][0]["verdict"], "fail");
        assert_eq!(json["check_results"][1]["verdict"], "indeterminate");
        assert!(json["collected_at"].is_string());
        assert_eq!(json["agent_version"], "0.1.0");
    }

    #[test]
    fn test_deserialize_dedupes_packages() {
        let json = r#"{
            "identity": {"hostname": "web-01"},
            "packages": [
                {"name": "bash", "version": "5.1"},
                {"name": "curl", "version": "7.88"},
                {"name": "bash", "version": "5.2"}
            ],
            "collected_at": "2024-03-01T12:00:00Z"
        }"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snap.packages.len(), 2);
        assert_eq!(snap.packages.get("bash").unwrap().version, "5.2");
        assert_eq!(snap.agent_version, "");
    }

    #[test]
    fn test_missing_hostname_deserializes_blank() {
        let snap: Snapshot =
            serde_json::from_str(r#"{"identity": {}, "collected_at": "2024-03-01T12:00:00Z"}"#)
                .unwrap();
        assert_eq!(snap.hostname(), "");
    }

    #[test]
    fn test_tally() {
        let tally = sample().tally();
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.indeterminate, 1);
        assert_eq!(tally.total(), 2);
    }
}
