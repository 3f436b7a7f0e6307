//! sparsedb server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SPARSEDB_HOST: Bind address (default: 0.0.0.0)
//! - SPARSEDB_PORT: Port number (default: 8080)
//! - RUST_LOG: Log level (default: info)

use sparsedb::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparsedb=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();
    let host = std::env::var("SPARSEDB_HOST").unwrap_or(defaults.host);
    let port: u16 = std::env::var("SPARSEDB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults.port);

    let config = ServerConfig { host, port };

    tracing::info!("sparsedb {} configuration:", env!("CARGO_PKG_VERSION"));
    tracing::info!("  Host: {}:{}", config.host, config.port);

    run_server(config).await
}
