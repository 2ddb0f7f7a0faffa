//! Posture Agent - host posture collector
//!
//! This is the main entry point for the agent binary deployed on hosts.
//! One invocation performs one collection run:
//! - Resolves host identity
//! - Evaluates the built-in and user-supplied checks
//! - Lists installed packages
//! - Submits the snapshot to the server, or prints it with `--scan-now`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use posture_audit::SnapshotBuilder;
use posture_checks::loader::extend_from_dir;
use posture_checks::CheckRegistry;
use posture_common::config::DEFAULT_AGENT_CONFIG;
use posture_common::{init_logging_with_config, Config, LogConfig};
use posture_core::{Check, CheckOutcome, Error, Snapshot, VerdictStatus};
use posture_transport::{RestClientConfig, SnapshotClient};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Posture Host Agent
#[derive(Parser, Debug)]
#[command(name = "posture-agent")]
#[command(version)]
#[command(about = "Collects host posture and reports it to the Posture server", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_AGENT_CONFIG)]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Server endpoint; overrides config
    #[arg(long)]
    endpoint: Option<String>,

    /// Collect and print results locally instead of submitting
    #[arg(long)]
    scan_now: bool,

    /// Output format for local results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Only show failed checks
    #[arg(long)]
    failures_only: bool,

    /// Include the package inventory in local output
    #[arg(long)]
    inventory: bool,

    /// Directory of additional YAML check definitions; overrides config
    #[arg(long)]
    checks_dir: Option<String>,

    /// Run only these check ids (repeatable)
    #[arg(long = "check", value_name = "ID")]
    checks: Vec<String>,

    /// Run only checks carrying one of these tags (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Table,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config))?
        .merge_env();
    if let Some(endpoint) = &args.endpoint {
        config.agent.endpoint = endpoint.clone();
    }
    if let Some(dir) = &args.checks_dir {
        config.agent.checks_dir = Some(dir.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    init_logging_with_config(LogConfig::from_section(&config.logging))?;

    info!("Posture Agent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);

    let registry = load_registry(&config)?;
    let checks = select_checks(&registry, &args.checks, &args.tags)?;
    debug!("{} of {} checks selected", checks.len(), registry.len());

    let builder = SnapshotBuilder::from_config(&config);
    let snapshot = match builder.build(checks).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Snapshot collection failed [{}]: {}", e.code(), e);
            std::process::exit(exit_code(&e));
        }
    };

    if args.scan_now {
        print_results(&snapshot, &args)?;

        let failed = snapshot.tally().failed;
        if failed > 0 {
            warn!("{} checks failed", failed);
            std::process::exit(1);
        }
        return Ok(());
    }

    submit(&snapshot, &config).await
}

/// Built-in catalogue plus any configured check directory
fn load_registry(config: &Config) -> Result<CheckRegistry> {
    let mut registry = CheckRegistry::with_builtin();
    if let Some(dir) = &config.agent.checks_dir {
        let added = extend_from_dir(&mut registry, dir)
            .with_context(|| format!("loading checks from {}", dir))?;
        debug!("{} additional checks registered from {}", added, dir);
    }
    Ok(registry)
}

/// Explicit ids win over tags; with neither, the default-enabled set runs
fn select_checks(
    registry: &CheckRegistry,
    ids: &[String],
    tags: &[String],
) -> Result<Vec<Arc<dyn Check>>> {
    if !ids.is_empty() {
        return Ok(registry.by_ids(ids)?);
    }
    if !tags.is_empty() {
        return Ok(registry.by_tags(tags));
    }
    Ok(registry.enabled_by_default())
}

/// 2 when the host cannot be reported at all, 1 otherwise
fn exit_code(err: &Error) -> i32 {
    if err.is_fatal() {
        2
    } else {
        1
    }
}

async fn submit(snapshot: &Snapshot, config: &Config) -> Result<()> {
    info!("Submitting snapshot to {}", config.agent.endpoint);
    let client = SnapshotClient::new(RestClientConfig::from_agent(&config.agent))?;
    let ack = client
        .submit(snapshot)
        .await
        .context("snapshot delivery failed")?;
    info!(
        "Server recorded {} ({}): compliance score {}",
        ack.hostname, ack.status, ack.compliance_score
    );
    Ok(())
}

fn selected<'a>(snapshot: &'a Snapshot, failures_only: bool) -> Vec<&'a CheckOutcome> {
    snapshot
        .check_results
        .iter()
        .filter(|r| !failures_only || r.status() == VerdictStatus::Fail)
        .collect()
}

fn print_results(snapshot: &Snapshot, args: &Args) -> Result<()> {
    match args.format {
        OutputFormat::Json => print_results_json(snapshot, args.failures_only, args.inventory)?,
        OutputFormat::Table => print_results_table(snapshot, args.failures_only, args.inventory),
        OutputFormat::Text => print_results_text(snapshot, args.failures_only, args.inventory),
    }
    Ok(())
}

/// Print results as JSON
fn print_results_json(snapshot: &Snapshot, failures_only: bool, inventory: bool) -> Result<()> {
    let tally = snapshot.tally();
    let mut output = serde_json::json!({
        "identity": snapshot.identity,
        "collected_at": snapshot.collected_at,
        "summary": {
            "total": tally.total(),
            "passed": tally.passed,
            "failed": tally.failed,
            "indeterminate": tally.indeterminate,
        },
        "check_results": selected(snapshot, failures_only),
    });
    if inventory {
        output["package_manager"] = serde_json::to_value(&snapshot.package_manager)?;
        output["packages"] = serde_json::to_value(&snapshot.packages)?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print results as table
fn print_results_table(snapshot: &Snapshot, failures_only: bool, inventory: bool) {
    println!(
        "\n{:<28} {:<46} {:<15} {:<14}",
        "CHECK ID", "TITLE", "STATUS", "REFERENCE"
    );
    println!("{}", "-".repeat(104));

    for r in selected(snapshot, failures_only) {
        let status = r.status();
        println!(
            "{:<28} {:<46} {}{:<15}\x1b[0m {:<14}",
            truncate(&r.check_id, 27),
            truncate(&r.title, 45),
            status_color(status),
            status.as_str(),
            r.reference
        );
    }

    println!("\n{}", "-".repeat(104));
    if inventory {
        print_inventory(snapshot);
    }
    print_summary(snapshot);
}

/// Print results as text
fn print_results_text(snapshot: &Snapshot, failures_only: bool, inventory: bool) {
    println!("\n=== Posture Results: {} ===\n", snapshot.identity.hostname);

    for r in selected(snapshot, failures_only) {
        let status = r.status();
        println!("[{}] {} - {}", status.as_str(), r.check_id, r.title);
        if !r.reference.is_empty() {
            println!("    Reference: {}", r.reference);
        }
        if !r.verdict.evidence.is_empty() {
            println!("    Evidence:");
            for line in r.verdict.evidence.lines() {
                println!("      {}", line);
            }
        }
        if !r.verdict.detail.is_empty() {
            println!("    Detail:    {}", r.verdict.detail);
        }
        println!();
    }

    if inventory {
        print_inventory(snapshot);
    }
    print_summary(snapshot);
}

fn print_inventory(snapshot: &Snapshot) {
    println!(
        "Packages ({}, {} installed):",
        snapshot.package_manager,
        snapshot.packages.len()
    );
    for pkg in snapshot.packages.iter() {
        println!("  {:<40} {}", pkg.name, pkg.version);
    }
    println!();
}

fn print_summary(snapshot: &Snapshot) {
    let tally = snapshot.tally();
    let identity = &snapshot.identity;
    println!(
        "Host: {} ({} {}, {})",
        identity.hostname, identity.os_family, identity.os_version, identity.architecture
    );
    println!("Summary:");
    println!("  Total:         {}", tally.total());
    println!(
        "  Passed:        {} ({:.1}% of decisive)",
        tally.passed,
        tally.pass_rate() * 100.0
    );
    println!("  Failed:        {}", tally.failed);
    println!("  Indeterminate: {}", tally.indeterminate);
}

fn status_color(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Pass => "\x1b[32m",
        VerdictStatus::Fail => "\x1b[31m",
        VerdictStatus::Indeterminate => "\x1b[33m",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
