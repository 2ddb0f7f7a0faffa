//! Check runner - executes checks concurrently against a prober

use crate::probe::Prober;
use posture_core::{Check, CheckOutcome, Evidence, Verdict, VerdictTally};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of a full audit run
#[derive(Debug, Clone)]
pub struct AuditResult {
    /// One outcome per check, in the order the checks were given
    pub outcomes: Vec<CheckOutcome>,
    /// Summary statistics
    pub summary: AuditSummary,
}

/// Summary of audit results
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditSummary {
    pub tally: VerdictTally,
    pub duration_ms: u64,
}

/// Runs checks with bounded concurrency
pub struct Auditor {
    prober: Arc<dyn Prober>,
    max_workers: usize,
}

impl Auditor {
    /// Create an auditor; `max_workers` of 0 means one per CPU
    pub fn new(prober: Arc<dyn Prober>, max_workers: usize) -> Self {
        let max_workers = if max_workers == 0 {
            num_cpus::get()
        } else {
            max_workers
        };
        Self {
            prober,
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every check; never fails as a whole
    ///
    /// A probe infrastructure error or a panic inside a check yields an
    /// Indeterminate verdict for that check only.
    pub async fn run(&self, checks: Vec<Arc<dyn Check>>) -> AuditResult {
        info!(
            "Starting audit: {} checks, {} workers",
            checks.len(),
            self.max_workers
        );
        let started = Instant::now();

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = Vec::with_capacity(checks.len());

        for check in checks {
            let template = CheckOutcome::new(check.id(), Verdict::indeterminate(""))
                .with_title(check.metadata().title.clone())
                .with_reference(check.metadata().reference.clone());

            let semaphore = Arc::clone(&semaphore);
            let prober = Arc::clone(&self.prober);
            let handle = tokio::spawn(async move {
                // A closed semaphore only removes the bound
                let _permit = semaphore.acquire_owned().await.ok();
                run_check(prober.as_ref(), check.as_ref()).await
            });

            pending.push((template, handle));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (mut outcome, handle) in pending {
            outcome.verdict = match handle.await {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!("Check {} aborted: {}", outcome.check_id, e);
                    Verdict::indeterminate(format!("check aborted: {}", e))
                }
            };
            debug!("{}: {}", outcome.check_id, outcome.verdict.status);
            outcomes.push(outcome);
        }

        let summary = AuditSummary {
            tally: outcomes.iter().map(|o| o.status()).collect(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Audit complete: {} passed, {} failed, {} indeterminate in {}ms",
            summary.tally.passed,
            summary.tally.failed,
            summary.tally.indeterminate,
            summary.duration_ms
        );

        AuditResult { outcomes, summary }
    }
}

/// Gather a check's evidence sequentially, then evaluate it
async fn run_check(prober: &dyn Prober, check: &dyn Check) -> Verdict {
    let specs = check.probes();
    let mut evidence = Vec::with_capacity(specs.len());

    for spec in specs {
        match prober.run(&spec).await {
            Ok(result) => evidence.push(Evidence::new(spec, result)),
            Err(e) => {
                warn!("Probe {} for {} failed: {}", spec.describe(), check.id(), e);
                return Verdict::indeterminate(format!("probe {} failed: {}", spec.describe(), e));
            }
        }
    }

    check.evaluate(&evidence)
}
