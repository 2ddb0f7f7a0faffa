//! Host identity resolution

use posture_core::{Error, HostIdentity, Result};
use std::path::PathBuf;

/// Resolves hostname, OS and architecture of the local host
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    hostname_override: Option<String>,
    system_lookup: bool,
    os_release: PathBuf,
    etc_hostname: PathBuf,
    kernel_release: PathBuf,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            hostname_override: None,
            system_lookup: true,
            os_release: PathBuf::from("/etc/os-release"),
            etc_hostname: PathBuf::from("/etc/hostname"),
            kernel_release: PathBuf::from("/proc/sys/kernel/osrelease"),
        }
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this hostname instead of the system one
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname_override = hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        self
    }

    /// Whether to ask the OS for its hostname before reading /etc/hostname
    pub fn with_system_lookup(mut self, enabled: bool) -> Self {
        self.system_lookup = enabled;
        self
    }

    /// Read os-release from a different path
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    /// Read the hostname fallback from a different path
    pub fn with_etc_hostname(mut self, path: impl Into<PathBuf>) -> Self {
        self.etc_hostname = path.into();
        self
    }

    /// Resolve the identity; fails only when no hostname can be found
    pub fn resolve(&self) -> Result<HostIdentity> {
        let hostname = self.hostname()?;

        let (os_family, os_version) = std::fs::read_to_string(&self.os_release)
            .ok()
            .map(|content| parse_os_release(&content))
            .unwrap_or_default();

        let os_family = if os_family.is_empty() {
            std::env::consts::OS.to_string()
        } else {
            os_family
        };
        let os_version = if os_version.is_empty() {
            std::fs::read_to_string(&self.kernel_release)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".into())
        } else {
            os_version
        };

        Ok(HostIdentity::new(hostname)
            .with_os(os_family, os_version)
            .with_architecture(std::env::consts::ARCH))
    }

    fn hostname(&self) -> Result<String> {
        if let Some(name) = &self.hostname_override {
            return Ok(name.clone());
        }

        if self.system_lookup {
            let from_system = hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().trim().to_string())
                .filter(|h| !h.is_empty());
            if let Some(name) = from_system {
                return Ok(name);
            }
        }

        std::fs::read_to_string(&self.etc_hostname)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::IdentityUnavailable("no hostname could be resolved".into()))
    }
}

/// Extract `ID` and `VERSION_ID` from os-release content
pub fn parse_os_release(content: &str) -> (String, String) {
    let mut family = String::new();
    let mut version = String::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("ID=") {
            family = unquote(v);
        } else if let Some(v) = line.strip_prefix("VERSION_ID=") {
            version = unquote(v);
        }
    }

    (family, version)
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}
