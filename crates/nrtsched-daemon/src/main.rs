//! nrtsched daemon
//!
//! Serves NUMA-aware filter and score evaluations over HTTP.

use anyhow::Context;
use clap::Parser;
use nrtsched_api::{create_router, AppState};
use nrtsched_core::{LoggingConfig, SchedulerConfig, ScoringStrategy};
use nrtsched_scheduler::TopologyStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// nrtschedd - NUMA-aware node filtering and scoring service
#[derive(Parser, Debug)]
#[command(name = "nrtschedd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node resource topology file or directory (JSON)
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Namespace searched for node topologies, in order (repeatable)
    #[arg(long = "namespace")]
    namespaces: Vec<String>,

    /// Default scoring strategy
    #[arg(long)]
    strategy: Option<String>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Load the configuration file and apply command line overrides
    fn into_config(self) -> anyhow::Result<SchedulerConfig> {
        let mut config = match &self.config {
            Some(path) => SchedulerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SchedulerConfig::default(),
        };

        if let Some(path) = self.topology {
            config.topology.path = Some(path);
        }
        if !self.namespaces.is_empty() {
            config.topology.namespaces = self.namespaces;
        }
        if let Some(strategy) = self.strategy {
            config.scoring.strategy = ScoringStrategy::from_name(&strategy);
        }
        if let Some(address) = self.address {
            config.api.rest_address = address;
        }
        if let Some(port) = self.port {
            config.api.rest_port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        Ok(config)
    }
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.to_lowercase()))
        .context("invalid log level")?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    let result = if logging.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("failed to set subscriber")
}

#[cfg(unix)]
async fn reload_on_hangup(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGHUP, topology reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        if let Err(e) = state.reload().await {
            warn!(error = %e, "Topology reload failed, keeping current snapshots");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.logging)?;

    info!("Starting nrtsched daemon v{}", env!("CARGO_PKG_VERSION"));

    let namespaces = config.topology.namespaces.clone();
    let store = match &config.topology.path {
        Some(path) => TopologyStore::load(path, namespaces)
            .with_context(|| format!("loading topologies from {}", path.display()))?,
        None => {
            warn!("No topology path configured, every node is treated as unconstrained");
            TopologyStore::new(namespaces)
        }
    };

    info!(
        nodes = store.node_names().len(),
        strategy = %config.scoring.strategy,
        reduction = ?config.scoring.reduction,
        "Topology store ready"
    );

    let state = Arc::new(AppState::new(
        store,
        config.scoring.clone(),
        config.topology.path.clone(),
    ));

    #[cfg(unix)]
    tokio::spawn(reload_on_hangup(Arc::clone(&state)));

    let router = create_router(state, config.api.cors_enabled);

    let addr: SocketAddr = format!("{}:{}", config.api.rest_address, config.api.rest_port)
        .parse()
        .context("invalid listen address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
