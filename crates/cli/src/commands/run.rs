//! The `run` command: one selection cycle

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use killer_lib::{
    Cluster, CycleConfig, CycleReport, EntropySource, ProtectionPolicy, RemovalMode,
    SelectionCycle, SelectionMetrics, StaticCluster,
};
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tracing::{info, warn};

use crate::client::KubeCluster;
use crate::config::KillerConfig;
use crate::output::{
    color_phase, color_verdict, print_info, print_success, print_table, print_warning,
    OutputFormat,
};

/// Arguments for a selection run; flags override config file and environment
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Namespace to select from
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Label selector restricting which pods may be targeted (e.g. "app=web,tier!=db")
    #[arg(long, short = 'l')]
    pub selector: Option<String>,

    /// Removal mode: delete or evict
    #[arg(long)]
    pub mode: Option<RemovalMode>,

    /// Pick a pod without removing it
    #[arg(long)]
    pub dry_run: bool,

    /// Protected namespace (repeatable; replaces the configured list)
    #[arg(long = "protected-namespace")]
    pub protected_namespaces: Vec<String>,

    /// Protected owner kind (repeatable; replaces the configured list)
    #[arg(long = "protected-owner-kind")]
    pub protected_owner_kinds: Vec<String>,

    /// Write Prometheus metrics to this textfile after the run
    #[arg(long)]
    pub metrics_textfile: Option<PathBuf>,

    /// Replay a JSON cluster snapshot instead of contacting a cluster (implies --dry-run)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Deadline for each API call in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Merge flags over loaded settings
pub fn resolve(args: &RunArgs, mut settings: KillerConfig) -> KillerConfig {
    if let Some(namespace) = &args.namespace {
        settings.namespace = namespace.clone();
    }
    if let Some(selector) = &args.selector {
        settings.selector = selector.clone();
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if !args.protected_namespaces.is_empty() {
        settings.protected_namespaces = args.protected_namespaces.clone();
    }
    if !args.protected_owner_kinds.is_empty() {
        settings.protected_owner_kinds = args.protected_owner_kinds.clone();
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    settings.dry_run |= args.dry_run || args.snapshot.is_some();
    settings
}

fn cycle_config(settings: &KillerConfig) -> CycleConfig {
    let protection: ProtectionPolicy = settings.protection();
    CycleConfig::new(settings.namespace.clone())
        .with_selector(settings.selector.clone())
        .with_protection(protection)
        .with_mode(settings.mode)
        .dry_run(settings.dry_run)
}

/// Run one selection cycle and print its report
pub async fn run(
    args: RunArgs,
    settings: KillerConfig,
    kubeconfig: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let settings = resolve(&args, settings);
    let cycle = SelectionCycle::new(cycle_config(&settings));

    let report = match &args.snapshot {
        Some(path) => {
            let cluster = load_snapshot(path)?;
            info!(snapshot = %path.display(), "Replaying cluster snapshot");
            execute(&cycle, &cluster).await
        }
        None => {
            let cluster = KubeCluster::connect(kubeconfig, settings.timeout()).await?;
            cluster.server_version().await?;
            execute(&cycle, &cluster).await
        }
    };

    if let Some(path) = &args.metrics_textfile {
        if let Err(e) = SelectionMetrics::new().write_textfile(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    print_report(&report?, format)
}

async fn execute<C: Cluster>(cycle: &SelectionCycle, cluster: &C) -> Result<CycleReport> {
    let mut rng = EntropySource::new();
    Ok(cycle.run(cluster, &mut rng).await?)
}

fn load_snapshot(path: &Path) -> Result<StaticCluster> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    StaticCluster::from_json(&json)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}

/// Row for the verdict table
#[derive(Tabled, serde::Serialize)]
struct VerdictRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", "Selection Cycle".bold());
    println!("{}", "=".repeat(60));
    println!("Namespace: {}", report.namespace.cyan());
    if !report.selector.is_empty() {
        println!("Selector:  {}", report.selector.cyan());
    }
    println!("Mode:      {}", report.mode);
    println!();

    let rows: Vec<VerdictRow> = report
        .verdicts
        .iter()
        .map(|v| VerdictRow {
            pod: v.instance.clone(),
            phase: color_phase(&v.phase.to_string()),
            verdict: color_verdict(v.admitted),
            reason: v.reason.clone(),
        })
        .collect();
    print_table(&rows, format, "No pods found");
    println!();

    for skipped in &report.skipped_budgets {
        print_warning(&format!("Ignored budget {}: {}", skipped.budget, skipped.error));
    }

    match &report.chosen {
        None => print_warning(&format!(
            "No eligible candidate in namespace {}",
            report.namespace
        )),
        Some(name) if report.removed => {
            print_success(&format!("Removed pod {} ({})", name, report.mode))
        }
        Some(name) => print_info(&format!("Selected pod {} (dry run, nothing removed)", name)),
    }

    Ok(())
}
