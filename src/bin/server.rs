//! River Server Binary
//!
//! Starts the TCP stream store.

use std::sync::Arc;

use clap::Parser;
use river::network::Server;
use river::{Engine, ServerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// River stream store
#[derive(Parser, Debug)]
#[command(name = "river-server")]
#[command(about = "In-memory store for fixed-schema record streams")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Largest batch returned by one fetch, in bytes
    #[arg(short = 'f', long, default_value = "4194304")]
    max_fetch_bytes: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,river=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("River Server v{}", river::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = ServerConfig::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .max_fetch_bytes(args.max_fetch_bytes)
        .build();

    let engine = Arc::new(Engine::new(config.clone()));

    let mut server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
