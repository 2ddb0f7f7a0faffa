//! Fleet-wide aggregation of per-check outcomes

use crate::store::{HostStore, StoreError};
use chrono::{DateTime, Utc};
use posture_core::{HostRecord, VerdictStatus, VerdictTally};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Checks below this pass rate are reported as critical
pub const CRITICAL_PASS_RATE: f64 = 0.5;

/// Number of entries in the top-failing list
pub const TOP_FAILING_LIMIT: usize = 5;

/// A host failing a particular check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailingHost {
    pub hostname: String,
    pub evidence: String,
    pub detail: String,
}

/// Outcome counts for one check id across the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckBreakdown {
    pub check_id: String,
    pub title: String,
    pub reference: String,
    #[serde(flatten)]
    pub tally: VerdictTally,
    /// pass / (pass + fail); indeterminate excluded, 0 with no decisive results
    pub pass_rate: f64,
    /// Sorted by hostname
    pub failing_hosts: Vec<FailingHost>,
}

/// Totals across every (host, check) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_hosts: usize,
    pub total_results: usize,
    pub total_passed: usize,
    pub total_failed: usize,
    pub total_indeterminate: usize,
    /// passed / total_results, indeterminate included; 0 with no results
    pub overall_pass_rate: f64,
    /// passed / (passed + failed); 0 with no decisive results
    pub decisive_pass_rate: f64,
}

/// Fleet report, recomputed on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub summary: FleetSummary,
    /// Ascending by pass rate, ties by check id
    pub checks: Vec<CheckBreakdown>,
    pub critical_checks: Vec<String>,
    pub top_failing_checks: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl FleetReport {
    pub fn check(&self, check_id: &str) -> Option<&CheckBreakdown> {
        self.checks.iter().find(|c| c.check_id == check_id)
    }
}

/// Builds fleet reports from the host store
pub struct FleetAggregator {
    store: Arc<dyn HostStore>,
}

impl FleetAggregator {
    pub fn new(store: Arc<dyn HostStore>) -> Self {
        Self { store }
    }

    /// Aggregate the current contents of the store
    pub async fn aggregate(&self) -> Result<FleetReport, StoreError> {
        let records = self.store.scan_all().await?;
        debug!("Aggregating {} host records", records.len());
        Ok(aggregate_records(&records, Utc::now()))
    }
}

/// Aggregate a set of host records
pub fn aggregate_records(records: &[HostRecord], generated_at: DateTime<Utc>) -> FleetReport {
    let mut by_check: BTreeMap<&str, CheckBreakdown> = BTreeMap::new();
    let mut overall = VerdictTally::default();

    for record in records {
        for outcome in &record.snapshot().check_results {
            let entry = by_check
                .entry(outcome.check_id.as_str())
                .or_insert_with(|| CheckBreakdown {
                    check_id: outcome.check_id.clone(),
                    title: String::new(),
                    reference: String::new(),
                    tally: VerdictTally::default(),
                    pass_rate: 0.0,
                    failing_hosts: Vec::new(),
                });

            if entry.title.is_empty() {
                entry.title = outcome.title.clone();
            }
            if entry.reference.is_empty() {
                entry.reference = outcome.reference.clone();
            }

            let status = outcome.status();
            entry.tally.record(status);
            overall.record(status);

            if status == VerdictStatus::Fail {
                entry.failing_hosts.push(FailingHost {
                    hostname: record.hostname().to_string(),
                    evidence: outcome.verdict.evidence.clone(),
                    detail: outcome.verdict.detail.clone(),
                });
            }
        }
    }

    let mut checks: Vec<CheckBreakdown> = by_check
        .into_values()
        .map(|mut entry| {
            entry.pass_rate = entry.tally.pass_rate();
            entry
                .failing_hosts
                .sort_by(|a, b| a.hostname.cmp(&b.hostname));
            entry
        })
        .collect();

    checks.sort_by(|a, b| {
        a.pass_rate
            .total_cmp(&b.pass_rate)
            .then_with(|| a.check_id.cmp(&b.check_id))
    });

    let critical_checks = checks
        .iter()
        .filter(|c| c.tally.decisive() > 0 && c.pass_rate < CRITICAL_PASS_RATE)
        .map(|c| c.check_id.clone())
        .collect();

    let top_failing_checks = checks
        .iter()
        .filter(|c| c.tally.failed > 0)
        .take(TOP_FAILING_LIMIT)
        .map(|c| c.check_id.clone())
        .collect();

    FleetReport {
        summary: FleetSummary {
            total_hosts: records.len(),
            total_results: overall.total(),
            total_passed: overall.passed,
            total_failed: overall.failed,
            total_indeterminate: overall.indeterminate,
            overall_pass_rate: share(overall.passed, overall.total()),
            decisive_pass_rate: overall.pass_rate(),
        },
        checks,
        critical_checks,
        top_failing_checks,
        generated_at,
    }
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
