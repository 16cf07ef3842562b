//! TypedKV server binary: CLI config, logging init, accept loop.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tkv_engine::Store;
use tkv_server::server;

/// In-memory typed key-value server.
#[derive(Debug, Parser)]
#[command(name = "tkv-server", version)]
struct Config {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7401")]
    bind: String,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(Store::new());
    let expirer = store.start_expirer();

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    info!(addr = %config.bind, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept connection")?;
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if let Err(err) = server::handle_connection(stream, store).await {
                        warn!(%peer, %err, "connection ended with error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    expirer.stop();
    Ok(())
}
