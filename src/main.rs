use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use proplan::api::{ServeConfig, run_http_server};
use proplan::persistence::{
    DEFAULT_STORAGE_KEY, FileBlobStore, PersistenceConfig, PersistenceGateway,
};

#[derive(Parser, Debug)]
#[command(
    name = "proplan",
    about = "Plan and compare property investment scenarios"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "./data", help = "Directory for persisted scenarios")]
        data_dir: PathBuf,
        #[arg(long, help = "Keep scenarios in memory only")]
        in_memory: bool,
        #[arg(
            long,
            default_value_t = 500,
            help = "Quiet period in milliseconds before a change is written"
        )]
        debounce_ms: u64,
    },
    /// Delete the persisted scenario blob.
    ClearData {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            in_memory,
            debounce_ms,
        } => {
            run_http_server(ServeConfig {
                port,
                data_dir: (!in_memory).then_some(data_dir),
                debounce: Duration::from_millis(debounce_ms),
            })
            .await
        }
        Command::ClearData { data_dir } => {
            let gateway = PersistenceGateway::new(
                FileBlobStore::new(&data_dir),
                PersistenceConfig::default(),
            );
            gateway
                .clear()
                .await
                .with_context(|| format!("clearing {}", data_dir.display()))?;
            info!(
                "Removed `{DEFAULT_STORAGE_KEY}` from {}",
                data_dir.display()
            );
            Ok(())
        }
    }
}
