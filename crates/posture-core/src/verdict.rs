//! Verdict outcomes and tallies

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one check on one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    /// The host satisfies the control
    Pass,
    /// The host was inspected and violates the control
    Fail,
    /// The evidence needed to decide was not obtainable
    Indeterminate,
}

impl VerdictStatus {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Pass => "PASS",
            VerdictStatus::Fail => "FAIL",
            VerdictStatus::Indeterminate => "INDETERMINATE",
        }
    }

    /// Whether this outcome counts towards a pass rate
    pub fn is_decisive(&self) -> bool {
        !matches!(self, VerdictStatus::Indeterminate)
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A verdict together with the raw evidence it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "verdict")]
    pub status: VerdictStatus,

    /// Raw probe output the decision was based on
    #[serde(default)]
    pub evidence: String,

    /// Human-readable explanation
    #[serde(default)]
    pub detail: String,
}

impl Verdict {
    pub fn new(status: VerdictStatus, evidence: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            evidence: evidence.into(),
            detail: detail.into(),
        }
    }

    pub fn pass(evidence: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(VerdictStatus::Pass, evidence, detail)
    }

    pub fn fail(evidence: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(VerdictStatus::Fail, evidence, detail)
    }

    pub fn indeterminate(detail: impl Into<String>) -> Self {
        Self::new(VerdictStatus::Indeterminate, String::new(), detail)
    }

    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == VerdictStatus::Fail
    }
}

/// Counts of verdicts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictTally {
    pub passed: usize,
    pub failed: usize,
    pub indeterminate: usize,
}

impl VerdictTally {
    pub fn record(&mut self, status: VerdictStatus) {
        match status {
            VerdictStatus::Pass => self.passed += 1,
            VerdictStatus::Fail => self.failed += 1,
            VerdictStatus::Indeterminate => self.indeterminate += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.indeterminate
    }

    /// Decisive results only (pass + fail)
    pub fn decisive(&self) -> usize {
        self.passed + self.failed
    }

    /// pass / (pass + fail), 0.0 when nothing was decisive
    pub fn pass_rate(&self) -> f64 {
        let decisive = self.decisive();
        if decisive == 0 {
            0.0
        } else {
            self.passed as f64 / decisive as f64
        }
    }
}

impl FromIterator<VerdictStatus> for VerdictTally {
    fn from_iter<I: IntoIterator<Item = VerdictStatus>>(iter: I) -> Self {
        let mut tally = VerdictTally::default();
        for status in iter {
            tally.record(status);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serializes_lowercase() {
        let v = Verdict::fail("PermitRootLogin yes", "root login allowed");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["verdict"], "fail");
        assert_eq!(json["evidence"], "PermitRootLogin yes");
    }

    #[test]
    fn test_tally_excludes_indeterminate_from_rate() {
        let tally: VerdictTally = [
            VerdictStatus::Pass,
            VerdictStatus::Fail,
            VerdictStatus::Indeterminate,
        ]
        .into_iter()
        .collect();

        assert_eq!(tally.total(), 3);
        assert_eq!(tally.decisive(), 2);
        assert!((tally.pass_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_tally_rate_is_zero() {
        assert_eq!(VerdictTally::default().pass_rate(), 0.0);

        let only_unknown: VerdictTally = std::iter::once(VerdictStatus::Indeterminate).collect();
        assert_eq!(only_unknown.pass_rate(), 0.0);
    }
}
