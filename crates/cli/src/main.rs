//! Pod Killer CLI
//!
//! Picks one pod in a namespace that can be removed right now without
//! violating any PodDisruptionBudget, then deletes or evicts it.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{budgets, run};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pod Killer CLI
#[derive(Parser)]
#[command(name = "pod-killer")]
#[command(author, version, about = "Disruption-budget-aware Pod Killer for chaos testing", long_about = None)]
pub struct Cli {
    /// Path to a kubeconfig file (otherwise in-cluster config, then $KUBECONFIG or ~/.kube/config)
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Path to a config file (defaults to ~/.config/pod-killer/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Log format for diagnostics written to stderr
    #[arg(long, default_value = "plain", global = true)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select one safe pod and remove it
    Run(run::RunArgs),

    /// Show disruption budget status in a namespace
    Budgets {
        /// Namespace to inspect
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let settings = config::KillerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            run::run(args, settings, cli.kubeconfig.as_deref(), cli.format).await?;
        }
        Commands::Budgets { namespace } => {
            let namespace = namespace.unwrap_or_else(|| settings.namespace.clone());
            budgets::show_budgets(&settings, cli.kubeconfig.as_deref(), &namespace, cli.format)
                .await?;
        }
    }

    Ok(())
}
