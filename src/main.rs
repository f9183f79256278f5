use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hashserve::{Opts, Server, DEFAULT_CAPACITY, DEFAULT_PORT};

/// Serves the SHA-256 digest of files under a directory, one request per connection.
#[derive(Parser)]
#[command(name = "hashserve", version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HASHSERVE_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    addr: SocketAddr,

    /// Number of digests kept in memory
    #[arg(long, env = "HASHSERVE_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Directory request paths are resolved against
    #[arg(long, env = "HASHSERVE_ROOT", default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let server = Server::new(Opts {
        addr: cli.addr,
        capacity: cli.capacity,
        root: cli.root,
    })
    .await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown().await
}
