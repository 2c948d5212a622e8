//! Submits a value to one node, or to every node of the cluster.
//!
//! ```bash
//! mvba-client --config cluster.toml --broadcast --instance 1 --value 42
//! ```

use bft_mvba::config::ClusterConfig;
use bft_mvba::transport::{propose, Reply};
use bft_mvba::Error;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::lookup_host;

#[derive(Parser, Debug)]
#[command(name = "mvba-client")]
#[command(version, about, long_about = None)]
struct Args {
    /// Cluster configuration file
    #[arg(long, default_value = "cluster.toml")]
    config: PathBuf,

    /// Host of the node to submit to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the node to submit to
    #[arg(long, required_unless_present = "broadcast")]
    port: Option<u16>,

    /// Submit to every node of the configuration
    #[arg(long)]
    broadcast: bool,

    #[arg(long)]
    instance: u64,

    #[arg(long)]
    value: String,
}

async fn targets(args: &Args) -> bft_mvba::Result<Vec<SocketAddr>> {
    if args.broadcast {
        let config = ClusterConfig::from_file(&args.config)?;
        return Ok(config.peers()?.into_values().collect());
    }

    let port = args
        .port
        .ok_or_else(|| Error::Config("--port is required".to_string()))?;
    let addrs = lookup_host((args.host.as_str(), port)).await?;
    Ok(addrs.take(1).collect())
}

async fn run(args: Args) -> bft_mvba::Result<bool> {
    let timeout = if args.broadcast {
        ClusterConfig::from_file(&args.config)?.timeout()
    } else {
        Duration::from_secs(2)
    };

    let mut all_acked = true;
    for addr in targets(&args).await? {
        let value = args.value.clone().into_bytes();
        match propose(&addr, args.instance, value, timeout).await {
            Ok(Reply::Ack) => println!("{addr}: ack"),
            Ok(Reply::Rejected(reason)) => {
                println!("{addr}: rejected: {reason}");
                all_acked = false;
            }
            Err(err) => {
                println!("{addr}: {err}");
                all_acked = false;
            }
        }
    }
    Ok(all_acked)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
