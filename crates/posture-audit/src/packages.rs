//! Package inventory collection across native package managers

use crate::probe::Prober;
use posture_core::{PackageInventory, PackageManager, PackageRecord, ProbeSpec};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Listing can take a while on large rpm databases
const LISTING_TIMEOUT_SECS: u64 = 60;

/// Detection order: first manager whose binary is present wins
const DETECTION_CHAIN: [(PackageManager, &str); 3] = [
    (PackageManager::Dpkg, "dpkg-query"),
    (PackageManager::Rpm, "rpm"),
    (PackageManager::Apk, "apk"),
];

/// Detects the native package manager and normalizes its listing
pub struct PackageCollector {
    prober: Arc<dyn Prober>,
}

impl PackageCollector {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Walk the detection chain; `PackageManager::None` when nothing matched
    pub async fn detect(&self) -> PackageManager {
        for (manager, binary) in DETECTION_CHAIN {
            match self.prober.run(&ProbeSpec::executable(binary)).await {
                Ok(result) if result.available => {
                    debug!("Detected package manager {} ({})", manager, result.text);
                    return manager;
                }
                Ok(_) => {}
                Err(e) => warn!("Could not probe for {}: {}", binary, e),
            }
        }
        PackageManager::None
    }

    /// Detect and list; failures degrade to an empty inventory
    pub async fn collect(&self) -> (PackageManager, PackageInventory) {
        let manager = self.detect().await;
        let Some(spec) = listing_command(manager) else {
            info!("No supported package manager detected");
            return (manager, PackageInventory::new());
        };

        let text = match self.prober.run(&spec).await {
            Ok(result) if result.available => result.text,
            Ok(_) => {
                warn!("{} listing unavailable; reporting no packages", manager);
                return (manager, PackageInventory::new());
            }
            Err(e) => {
                warn!("{} listing failed: {}; reporting no packages", manager, e);
                return (manager, PackageInventory::new());
            }
        };

        let inventory = parse_listing(manager, &text);
        info!("Collected {} packages via {}", inventory.len(), manager);
        (manager, inventory)
    }
}

/// Command that lists installed packages for a manager
pub fn listing_command(manager: PackageManager) -> Option<ProbeSpec> {
    let spec = match manager {
        PackageManager::Dpkg => {
            ProbeSpec::command("dpkg-query", ["-W", "-f", "${Package}\t${Version}\n"])
        }
        PackageManager::Rpm => {
            ProbeSpec::command("rpm", ["-qa", "--qf", "%{NAME}\t%{VERSION}-%{RELEASE}\n"])
        }
        PackageManager::Apk => ProbeSpec::command("apk", ["info", "-v"]),
        PackageManager::None => return None,
    };
    Some(spec.require_success().with_timeout(LISTING_TIMEOUT_SECS))
}

/// Parse a manager's listing output
pub fn parse_listing(manager: PackageManager, text: &str) -> PackageInventory {
    match manager {
        PackageManager::Dpkg | PackageManager::Rpm => parse_tab_separated(text),
        PackageManager::Apk => parse_apk(text),
        PackageManager::None => PackageInventory::new(),
    }
}

/// `name<TAB>version` per line; malformed lines are skipped
pub fn parse_tab_separated(text: &str) -> PackageInventory {
    text.lines()
        .filter_map(|line| {
            let (name, version) = line.split_once('\t')?;
            let (name, version) = (name.trim(), version.trim());
            (!name.is_empty() && !version.is_empty()).then(|| PackageRecord::new(name, version))
        })
        .collect()
}

/// `apk info -v` lines such as `musl-1.2.4-r2`
pub fn parse_apk(text: &str) -> PackageInventory {
    text.lines()
        .filter_map(|line| split_apk_entry(line.trim()))
        .collect()
}

fn split_apk_entry(entry: &str) -> Option<PackageRecord> {
    if entry.is_empty() || entry.contains(char::is_whitespace) {
        return None;
    }

    // Peel off the -rN release suffix before looking for the version
    let (stem, release) = match entry.rsplit_once('-') {
        Some((stem, rel))
            if rel.len() > 1
                && rel.starts_with('r')
                && rel[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            (stem, Some(rel))
        }
        _ => (entry, None),
    };

    let split = stem
        .char_indices()
        .filter(|&(i, c)| {
            c == '-'
                && stem[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|n| n.is_ascii_digit())
        })
        .map(|(i, _)| i)
        .last()?;

    let name = &stem[..split];
    let version = &stem[split + 1..];
    if name.is_empty() || version.is_empty() {
        return None;
    }

    let version = match release {
        Some(rel) => format!("{}-{}", version, rel),
        None => version.to_string(),
    };
    Some(PackageRecord::new(name, version))
}
