//! pod-audit: fleet reconciler for standby-pair deployments.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use standby_pair::audit::{CycleAction, Reconciler};
use standby_pair::config::load_or_default;
use standby_pair::kube::{KubeClient, KubePodInventory};
use standby_pair::lifecycle::{wait_for_termination, Shutdown};
use standby_pair::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "pod-audit")]
#[command(about = "Removes instances that break the single-active invariant", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one audit cycle (plus its verification re-check) and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability, "pod_audit");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = match KubeClient::from_config(&config.kubernetes) {
        Ok(Some(client)) => client,
        Ok(None) => {
            tracing::error!("Kubernetes API not available; set kubernetes.api_url or run in a cluster");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Kubernetes client");
            return ExitCode::FAILURE;
        }
    };

    let inventory = Arc::new(KubePodInventory::new(client, &config.kubernetes));
    let mut reconciler = Reconciler::new(inventory, config.audit.clone());

    if cli.once {
        let mut outcome = reconciler.cycle().await;
        if outcome.action == CycleAction::VerificationScheduled {
            tokio::time::sleep(outcome.next_delay).await;
            outcome = reconciler.cycle().await;
        }
        tracing::info!(verdict = outcome.verdict.label(), action = ?outcome.action, "Audit cycle complete");
        if let CycleAction::Deleted { failed, .. } = &outcome.action {
            if !failed.is_empty() {
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_termination(shutdown.clone()));
    reconciler.run(shutdown.subscribe()).await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
