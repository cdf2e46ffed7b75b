//! The `budgets` command: read-only budget inspection

use anyhow::Result;
use colored::Colorize;
use killer_lib::{inspect_budgets, BudgetReport, BudgetSource, InstanceSource};
use tabled::Tabled;

use crate::client::KubeCluster;
use crate::config::KillerConfig;
use crate::output::{color_allowed, or_dash, print_error, print_table, OutputFormat};

/// Row for the budget table
#[derive(Tabled, serde::Serialize)]
struct BudgetRow {
    #[tabled(rename = "Budget")]
    name: String,
    #[tabled(rename = "Min Available")]
    min_available: String,
    #[tabled(rename = "Max Unavailable")]
    max_unavailable: String,
    #[tabled(rename = "Matched")]
    matched: String,
    #[tabled(rename = "Healthy")]
    healthy: String,
    #[tabled(rename = "Desired")]
    desired: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
}

impl From<&BudgetReport> for BudgetRow {
    fn from(report: &BudgetReport) -> Self {
        let column = |value: Option<i32>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
        let status = report.status.as_ref();
        Self {
            name: report.name.clone(),
            min_available: or_dash(report.min_available.as_deref()),
            max_unavailable: or_dash(report.max_unavailable.as_deref()),
            matched: column(status.map(|s| s.matched)),
            healthy: column(status.map(|s| s.current_healthy)),
            desired: column(status.map(|s| s.desired_healthy)),
            allowed: status
                .map(|s| color_allowed(s.allowed_disruptions))
                .unwrap_or_else(|| "invalid".red().to_string()),
        }
    }
}

/// Show disruption budget status for a namespace
pub async fn show_budgets(
    settings: &KillerConfig,
    kubeconfig: Option<&str>,
    namespace: &str,
    format: OutputFormat,
) -> Result<()> {
    let cluster = KubeCluster::connect(kubeconfig, settings.timeout()).await?;
    let (instances, budgets) = tokio::try_join!(
        cluster.list_instances(namespace),
        cluster.list_budgets(namespace),
    )?;

    let reports = inspect_budgets(&budgets, &instances);
    print_reports(&reports, namespace, format)
}

fn print_reports(reports: &[BudgetReport], namespace: &str, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    println!("{}", "Disruption Budgets".bold());
    println!("{}", "=".repeat(60));
    println!("Namespace: {}", namespace.cyan());
    println!();

    let rows: Vec<BudgetRow> = reports.iter().map(BudgetRow::from).collect();
    print_table(&rows, format, "No PodDisruptionBudgets found");

    for report in reports {
        if let Some(error) = &report.error {
            print_error(error);
        }
    }
    Ok(())
}
