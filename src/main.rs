//! standby-pair instance daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────── instance ─────────────────────────────┐
//!                 │                                                                   │
//!  registry ◀─────┼── election controller ──▶ activation signal ──▶ app server        │
//!  (GET/SET)      │        │        ▲                                 (host:8082)     │
//!                 │        │        │ LinkLoss                                        │
//!                 │        ▼        │                                                 │
//!                 │   liveness client ◀──── markers ──── liveness server (this port)  │
//!                 │                         (from the active)   ▲                     │
//!                 │                                             │ stand-bys dial in   │
//!                 │   role announcer ──▶ pod label (Kubernetes)                        │
//!                 └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without a liveness port the instance runs standalone and is active at once.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use standby_pair::config::{load_or_default, validation::validate_config, PairConfig};
use standby_pair::election::ElectionController;
use standby_pair::http::{AppServer, AppState};
use standby_pair::kube::{DetachedAnnouncer, KubeClient, PodLabelAnnouncer, RoleAnnouncer};
use standby_pair::lifecycle::{wait_for_termination, Shutdown};
use standby_pair::observability::{logging, metrics};
use standby_pair::registry::{ActiveRegistry, RedisRegistry};

#[derive(Parser)]
#[command(name = "standby-pair")]
#[command(about = "Active/stand-by instance with liveness-based failover", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Liveness listener port; omit to run standalone
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.node.liveness_port = Some(port);
        if let Err(errors) = validate_config(&config) {
            for error in errors {
                eprintln!("Invalid configuration: {}", error);
            }
            return ExitCode::FAILURE;
        }
    }

    logging::init_logging(&config.observability, "standby_pair");
    tracing::info!("standby-pair v{} starting", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Instance failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: PairConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let host = config
        .node
        .host
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let pod_name = config
        .node
        .pod_name
        .clone()
        .unwrap_or_else(|| "localhost".to_string());

    tracing::info!(
        host = %host,
        pod = %pod_name,
        liveness_port = ?config.node.liveness_port,
        registry = %config.registry.address,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_termination(shutdown.clone()));

    let announcer: Arc<dyn RoleAnnouncer> = match KubeClient::from_config(&config.kubernetes) {
        Ok(Some(client)) => Arc::new(PodLabelAnnouncer::new(
            client,
            pod_name.clone(),
            config.kubernetes.role_label.clone(),
        )),
        Ok(None) => Arc::new(DetachedAnnouncer),
        Err(e) => {
            tracing::warn!(error = %e, "Kubernetes client unavailable, role labels disabled");
            Arc::new(DetachedAnnouncer)
        }
    };
    let registry: Arc<dyn ActiveRegistry> = Arc::new(RedisRegistry::new(&config.registry));

    let handle = ElectionController::from_config(&config, registry, announcer)
        .initialize(config.node.liveness_port, &shutdown)
        .await?;

    if config.app.enabled {
        let state = AppState::new(pod_name, handle.subscribe_state(), handle.address().cloned());
        let bind = format!("{}:{}", host, config.app.port);
        let app_shutdown = shutdown.clone();
        handle.on_active(move || {
            tokio::spawn(async move {
                let listener = match TcpListener::bind(&bind).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(address = %bind, error = %e, "Failed to bind application server");
                        return;
                    }
                };
                if let Err(e) = AppServer::new(state).run(listener, app_shutdown.subscribe()).await {
                    tracing::error!(error = %e, "Application server failed");
                }
            });
        });
    }

    let result = handle.join().await;
    shutdown.trigger();
    result?;
    Ok(())
}
