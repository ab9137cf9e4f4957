//! nrtsched CLI
//!
//! Evaluates workloads against node topologies offline, or through the
//! nrtsched daemon.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// nrtsched - NUMA-aware node filtering and scoring
#[derive(Parser, Debug)]
#[command(name = "nrtsched")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:9095", global = true)]
    api: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filter and score every node of a topology file locally
    Evaluate {
        /// Node resource topology file or directory (JSON)
        #[arg(long)]
        topology: PathBuf,

        /// Workload file (JSON)
        #[arg(long)]
        workload: PathBuf,

        /// Scoring strategy (least-allocatable, most-allocatable, balanced-allocation)
        #[arg(long)]
        strategy: Option<String>,

        /// Namespace searched for node topologies, in order (repeatable)
        #[arg(long = "namespace")]
        namespaces: Vec<String>,

        /// Configuration file providing scoring weights (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Ask the daemon which nodes can host a workload
    Filter {
        /// Workload file (JSON)
        workload: PathBuf,

        /// Candidate nodes (all known nodes if omitted)
        nodes: Vec<String>,
    },

    /// Ask the daemon to score nodes for a workload
    Score {
        /// Workload file (JSON)
        workload: PathBuf,

        /// Candidate nodes (all known nodes if omitted)
        nodes: Vec<String>,

        /// Scoring strategy override
        #[arg(long)]
        strategy: Option<String>,
    },

    /// List node topologies known to the daemon
    Nodes,

    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api);

    match cli.command {
        Commands::Evaluate {
            topology,
            workload,
            strategy,
            namespaces,
            config,
        } => {
            commands::evaluate(topology, workload, strategy, namespaces, config).await?;
        }
        Commands::Filter { workload, nodes } => {
            commands::filter(&client, workload, nodes).await?;
        }
        Commands::Score {
            workload,
            nodes,
            strategy,
        } => {
            commands::score(&client, workload, nodes, strategy).await?;
        }
        Commands::Nodes => {
            commands::nodes(&client).await?;
        }
        Commands::Status => {
            commands::status(&client).await?;
        }
    }

    Ok(())
}
