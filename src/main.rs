//! Echo server demonstrating `linkframe` usage.
//!
//! Every frame with message id 1 is written back to its sender; any frame
//! also counts as a heartbeat pulse.

mod cli;

use std::{error::Error, net::SocketAddr};

use clap::Parser;
use linkframe::{Request, Router, Server, ServerConfig};
use tracing::{info, warn};

const ECHO_ID: u16 = 1;

async fn echo(req: Request) {
    let conn = req.connection();
    conn.pulse_heartbeat();
    if let Err(e) = conn.send_message(req.msg_id(), req.data().clone()).await {
        warn!(conn_id = %conn.id(), error = %e, "echo failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.worker_pool_size = workers;
    }
    if let Some(secs) = cli.heartbeat {
        config.heartbeat = true;
        config.heartbeat_timeout_secs = secs;
    }
    let addr: SocketAddr = match cli.bind {
        Some(addr) => addr,
        None => config.bind_addr().parse()?,
    };

    #[cfg(feature = "metrics")]
    if let Some(metrics_addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!(%metrics_addr, "serving metrics");
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_addr.is_some() {
        warn!("built without the metrics feature; ignoring --metrics-addr");
    }

    let router = Router::new().route(ECHO_ID, echo)?;
    let server = Server::new(config, router)
        .on_heartbeat(|conn, status| info!(conn_id = %conn.id(), %status, "heartbeat"))
        .bind(addr)?;
    server.run().await?;
    Ok(())
}
