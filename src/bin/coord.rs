//! Coordinator binary

use clap::{Parser, Subcommand};
use minifs::{common::Config, CoordinatorServer};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minifs-coord")]
#[command(about = "minifs coordinator spreading files across storage nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Number of storage nodes
        #[arg(long)]
        num_nodes: Option<usize>,

        /// Explicit node addresses in id order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        nodes: Vec<String>,

        /// Host the nodes are discovered on
        #[arg(long)]
        discovery_host: Option<String>,

        /// Discovery base port; node i listens on port + 1 + i
        #[arg(long)]
        discovery_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config from file and environment, then override with CLI arguments
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            num_nodes,
            nodes,
            discovery_host,
            discovery_port,
        } => {
            let mut coord_config = config.coordinator.unwrap_or_default();
            if let Some(bind) = bind {
                coord_config.bind_addr = bind;
            }
            if !nodes.is_empty() {
                coord_config.num_nodes = nodes.len();
                coord_config.nodes = nodes;
            }
            if let Some(num_nodes) = num_nodes {
                coord_config.num_nodes = num_nodes;
            }
            if let Some(host) = discovery_host {
                coord_config.discovery_host = host;
            }
            if let Some(port) = discovery_port {
                coord_config.discovery_port = port;
            }

            CoordinatorServer::new(coord_config).serve().await?;
        }
    }

    Ok(())
}
