//! Runs one member of an MVBA cluster.
//!
//! ```bash
//! RUST_LOG=info mvba-node --id 1 --config cluster.toml
//! ```

use bft_mvba::config::ClusterConfig;
use bft_mvba::transport::{serve, TcpTransport};
use bft_mvba::{Consensus, Node};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "mvba-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Id of this node, between 1 and n
    #[arg(long)]
    id: usize,

    /// Port to listen on. Defaults to the port of `id` in the config
    #[arg(long)]
    port: Option<u16>,

    /// Cluster configuration file
    #[arg(long, default_value = "cluster.toml")]
    config: PathBuf,

    /// Number of peer frames handled at once
    #[arg(long, default_value = "64")]
    workers: usize,
}

async fn run(args: Args) -> bft_mvba::Result<()> {
    let config = ClusterConfig::from_file(&args.config)?;
    let cluster = config.cluster()?;
    let port = match args.port {
        Some(port) => port,
        None => config.port_of(args.id)?,
    };

    log::info!(
        "node {} of {} (f = {}, quorum = {})",
        args.id,
        cluster.size(),
        cluster.faulty(),
        cluster.quorum()
    );
    let consensus = Consensus::new(args.id, cluster)?;
    let transport = TcpTransport::new(config.peers()?, config.timeout());
    let node = Arc::new(Node::new(consensus, transport));

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve(listener, node, args.workers).await
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
