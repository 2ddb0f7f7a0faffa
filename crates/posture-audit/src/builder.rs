//! Snapshot builder - identity + checks + packages into one Snapshot

use crate::auditor::{AuditSummary, Auditor};
use crate::identity::IdentityResolver;
use crate::packages::PackageCollector;
use crate::probe::{Prober, SystemProber};
use chrono::Utc;
use posture_common::Config;
use posture_core::{Check, Result, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Orchestrates one collection run on the local host
pub struct SnapshotBuilder {
    identity: IdentityResolver,
    auditor: Auditor,
    packages: PackageCollector,
    collect_packages: bool,
}

impl SnapshotBuilder {
    pub fn new(prober: Arc<dyn Prober>, identity: IdentityResolver, max_workers: usize) -> Self {
        Self {
            identity,
            auditor: Auditor::new(Arc::clone(&prober), max_workers),
            packages: PackageCollector::new(prober),
            collect_packages: true,
        }
    }

    /// Builder wired to the live system according to configuration
    pub fn from_config(config: &Config) -> Self {
        let prober = Arc::new(SystemProber::new(Duration::from_secs(
            config.probe.timeout_seconds.max(1),
        )));
        let identity = IdentityResolver::new().with_hostname(config.agent.hostname.clone());
        Self::new(prober, identity, config.agent.effective_workers())
    }

    /// Skip package inventory (marker stays `none`)
    pub fn without_packages(mut self) -> Self {
        self.collect_packages = false;
        self
    }

    /// Run a full collection
    ///
    /// Only an unresolvable hostname is fatal; everything else degrades.
    pub async fn build(&self, checks: Vec<Arc<dyn Check>>) -> Result<Snapshot> {
        let identity = self.identity.resolve()?;
        info!("Collecting snapshot for {}", identity.hostname);
        let collected_at = Utc::now();

        let packages = async {
            if self.collect_packages {
                Some(self.packages.collect().await)
            } else {
                None
            }
        };
        let (audit, packages) = tokio::join!(self.auditor.run(checks), packages);

        let mut snapshot =
            Snapshot::new(identity, collected_at).with_agent_version(env!("CARGO_PKG_VERSION"));
        snapshot.check_results = audit.outcomes;
        if let Some((manager, inventory)) = packages {
            snapshot = snapshot.with_packages(manager, inventory);
        }

        log_summary(&snapshot, &audit.summary);
        Ok(snapshot)
    }
}

fn log_summary(snapshot: &Snapshot, summary: &AuditSummary) {
    info!(
        hostname = %snapshot.identity.hostname,
        checks = snapshot.check_results.len(),
        passed = summary.tally.passed,
        failed = summary.tally.failed,
        indeterminate = summary.tally.indeterminate,
        packages = snapshot.packages.len(),
        package_manager = %snapshot.package_manager,
        "Snapshot collected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::listing_command;
    use crate::probe::scripted::ScriptedProber;
    use posture_checks::CheckRegistry;
    use posture_core::{Error, PackageManager, ProbeSpec, VerdictStatus};
    use tempfile::TempDir;

    fn identity(tmp: &TempDir) -> IdentityResolver {
        let os_release = tmp.path().join("os-release");
        std::fs::write(&os_release, "ID=debian\nVERSION_ID=\"12\"\n").unwrap();
        IdentityResolver::new()
            .with_hostname(Some("web-01".into()))
            .with_os_release(os_release)
    }

    #[tokio::test]
    async fn test_build_full_snapshot() {
        let tmp = TempDir::new().unwrap();
        let prober = ScriptedProber::new()
            .found(
                ProbeSpec::read_file("/etc/ssh/sshd_config"),
                "PermitRootLogin yes\n",
            )
            .found(ProbeSpec::read_file("/proc/sys/net/ipv4/ip_forward"), "0\n")
            .found(ProbeSpec::executable("dpkg-query"), "/usr/bin/dpkg-query")
            .found(
                listing_command(PackageManager::Dpkg).unwrap(),
                "bash\t5.2\ncurl\t7.88\n",
            );

        let registry = CheckRegistry::with_builtin();
        let builder = SnapshotBuilder::new(Arc::new(prober), identity(&tmp), 4);
        let snapshot = builder.build(registry.all().collect()).await.unwrap();

        assert_eq!(snapshot.identity.hostname, "web-01");
        assert_eq!(snapshot.identity.os_family, "debian");
        assert_eq!(snapshot.check_results.len(), registry.len());
        assert_eq!(snapshot.package_manager, PackageManager::Dpkg);
        assert_eq!(snapshot.packages.len(), 2);
        assert_eq!(snapshot.agent_version, env!("CARGO_PKG_VERSION"));

        let by_id = |id: &str| {
            snapshot
                .check_results
                .iter()
                .find(|r| r.check_id == id)
                .unwrap()
                .status()
        };
        assert_eq!(by_id("ssh-root-login"), VerdictStatus::Fail);
        assert_eq!(by_id("ip-forwarding"), VerdictStatus::Pass);
        assert_eq!(by_id("firewall-enabled"), VerdictStatus::Indeterminate);
        assert_eq!(by_id("gdm-autologin"), VerdictStatus::Pass);

        let tally = snapshot.tally();
        assert_eq!(tally.total(), snapshot.check_results.len());
    }

    #[tokio::test]
    async fn test_unresolvable_hostname_aborts_build() {
        let tmp = TempDir::new().unwrap();
        let etc_hostname = tmp.path().join("hostname");
        std::fs::write(&etc_hostname, "").unwrap();
        let identity = IdentityResolver::new()
            .with_system_lookup(false)
            .with_etc_hostname(etc_hostname);

        let prober = Arc::new(ScriptedProber::new());
        let builder = SnapshotBuilder::new(Arc::clone(&prober) as Arc<dyn Prober>, identity, 2);
        let err = builder
            .build(CheckRegistry::with_builtin().all().collect())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::IdentityUnavailable(_)));
        // Nothing was probed once identity failed
        assert!(prober.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_packages() {
        let tmp = TempDir::new().unwrap();
        let builder = SnapshotBuilder::new(Arc::new(ScriptedProber::new()), identity(&tmp), 1)
            .without_packages();

        let snapshot = builder.build(Vec::new()).await.unwrap();
        assert_eq!(snapshot.package_manager, PackageManager::None);
        assert!(snapshot.packages.is_empty());
        assert!(snapshot.check_results.is_empty());
    }
}
