use anyhow::Result;
use clap::{Parser, Subcommand};
use minifs::{common::Config, NodeServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "minifs-node")]
#[command(about = "minifs storage node - keeps files on local disk")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start storage node
    Serve {
        /// Node ID (position in the coordinator's node list)
        #[arg(short, long)]
        id: Option<usize>,

        /// Address to listen on (default: 0.0.0.0, port discovery + 1 + id)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Data directory for storage (default: ./data/node-<id>)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Discovery base port
        #[arg(long)]
        discovery_port: Option<u16>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve {
            id,
            bind,
            data_dir,
            discovery_port,
            log_level,
        } => {
            let log_level = log_level.unwrap_or(config.log_level);
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| log_level.into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut node_config = config.node.unwrap_or_default();
            if let Some(id) = id {
                node_config.id = id;
            }
            if bind.is_some() {
                node_config.bind_addr = bind;
            }
            if data_dir.is_some() {
                node_config.data_dir = data_dir;
            }
            if let Some(port) = discovery_port {
                node_config.discovery_port = port;
            }

            NodeServer::new(node_config).serve().await?;
        }
    }

    Ok(())
}
