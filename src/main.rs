use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod handlers;
mod headers;
mod request;
mod response;
mod server;

use crate::config::Args;
use crate::server::HttpServer;

const LISTEN_ADDR: &str = "0.0.0.0:4221";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    let (server, shutdown_tx) = HttpServer::serve(LISTEN_ADDR, args.directory.clone()).await?;
    info!(addr = LISTEN_ADDR, directory = %args.directory.display(), "server started");

    let handle = tokio::spawn(server.listen());

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    shutdown_tx.send(()).ok();

    match handle.await {
        Ok(Ok(())) => info!("server shut down gracefully"),
        Ok(Err(e)) => error!(error = %e, "server error"),
        Err(e) => error!(error = %e, "server task panicked"),
    }

    Ok(())
}
