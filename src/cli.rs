//! Command line interface for the `linkframe` echo server.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `linkframe` binary.
///
/// Flags override the matching values read from `--config`.
#[derive(Debug, Parser)]
#[command(
    name = "linkframe",
    version,
    about = "Echo server built on the linkframe connection engine"
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding `host` and `tcp_port`.
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Number of handler workers; zero spawns a task per request.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Heartbeat timeout in seconds; enables the heartbeat monitor.
    #[arg(long, value_name = "SECS")]
    pub heartbeat: Option<u64>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}
