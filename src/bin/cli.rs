//! CLI for the coordinator's HTTP API

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use minifs::common::{encode_name, format_bytes};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "minifs")]
#[command(about = "minifs distributed file store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:5000")]
    coordinator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every file in the system
    List,

    /// Download a file
    Download {
        /// File name
        name: String,

        /// Output file (default: the file name)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Upload a file
    Upload {
        /// Local file path
        file: PathBuf,

        /// Name to store under (default: the file name)
        #[arg(long)]
        name: Option<String>,

        /// Store on every node instead of the least loaded one
        #[arg(long)]
        replicate: bool,
    },

    /// Delete a file from every node
    Delete {
        /// File name
        name: String,
    },

    /// Check whether a file exists
    Exists {
        /// File name
        name: String,
    },

    /// Show node status
    Nodes,
}

#[derive(Deserialize)]
struct ListReply {
    files: Vec<String>,
}

#[derive(Deserialize)]
struct ExistsReply {
    exists: bool,
}

#[derive(Deserialize)]
struct NodeReply {
    id: usize,
    live: bool,
}

#[derive(Deserialize)]
struct NodesReply {
    nodes: Vec<NodeReply>,
    live: usize,
    total: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let base = cli.coordinator.trim_end_matches('/').to_string();
    let client = Client::new();
    let file_url = |name: &str| format!("{}/files/{}", base, encode_name(name));

    match cli.command {
        Commands::List => {
            let reply: ListReply = client
                .get(format!("{}/files", base))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if reply.files.is_empty() {
                println!("No files stored");
            }
            for name in reply.files {
                println!("{}", name);
            }
        }

        Commands::Download { name, output } => {
            let resp = client.get(file_url(&name)).send().await?;
            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                bail!("{}", resp.text().await?);
            }
            if !status.is_success() {
                bail!("Download failed ({}): {}", status, resp.text().await?);
            }
            let data = resp.bytes().await?;
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(name.rsplit('/').next().unwrap_or(&name)),
            };
            tokio::fs::write(&output, &data)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Downloaded {} ({}) to {}",
                name,
                format_bytes(data.len() as u64),
                output.display()
            );
        }

        Commands::Upload {
            file,
            name,
            replicate,
        } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("cannot derive a file name, pass --name")?,
            };
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let resp = client
                .put(file_url(&name))
                .query(&[("replicate", replicate)])
                .body(data)
                .send()
                .await?;
            let status = resp.status();
            let message = resp.text().await?;
            if !status.is_success() {
                bail!("{}", message);
            }
            println!("{}", message);
        }

        Commands::Delete { name } => {
            let resp = client.delete(file_url(&name)).send().await?;
            let status = resp.status();
            let message = resp.text().await?;
            if !status.is_success() {
                bail!("{}", message);
            }
            println!("{}", message);
        }

        Commands::Exists { name } => {
            let reply: ExistsReply = client
                .get(format!("{}/exists/{}", base, encode_name(&name)))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if reply.exists {
                println!("{} exists", name);
            } else {
                println!("{} does not exist", name);
            }
        }

        Commands::Nodes => {
            let reply: NodesReply = client
                .get(format!("{}/nodes", base))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("Nodes: {}/{} live", reply.live, reply.total);
            for node in reply.nodes {
                println!(
                    "  node {}: {}",
                    node.id,
                    if node.live { "live" } else { "dead" }
                );
            }
        }
    }

    Ok(())
}
