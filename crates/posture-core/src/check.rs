//! Check trait and metadata - the interface all posture checks implement

use crate::probe::{Evidence, ProbeSpec};
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// The trait that all posture checks must implement
///
/// A check declares the probes it needs up front; the runner executes them
/// and hands the evidence back to `evaluate`, which must be a pure function.
pub trait Check: Send + Sync {
    /// Unique identifier for this check (e.g., "ssh-root-login")
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Get the check metadata
    fn metadata(&self) -> &CheckMetadata;

    /// Probes to run, in order; evidence is passed to `evaluate` in the same order
    fn probes(&self) -> Vec<ProbeSpec>;

    /// Map collected evidence to a verdict
    fn evaluate(&self, evidence: &[Evidence]) -> Verdict;
}

/// Metadata describing a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMetadata {
    /// Unique identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Benchmark citation, e.g. "CIS 5.2.10"
    #[serde(default, alias = "reference_tag")]
    pub reference: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Whether this check is enabled by default
    #[serde(default = "default_enabled")]
    pub enabled_by_default: bool,

    /// Tags for filtering/grouping
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl CheckMetadata {
    /// Create new check metadata
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            reference: String::new(),
            description: String::new(),
            enabled_by_default: true,
            tags: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
