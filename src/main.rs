//! Chat relay server - Entry Point
//!
//! Parses the command line, binds the listener and serves until Ctrl-C.

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatServer, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let config = ServerConfig::from(Cli::parse());

    let server = ChatServer::bind(config)
        .await
        .inspect_err(|e| error!("Server startup failed: {}", e))?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
