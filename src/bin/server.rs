//! bookvault Server Binary
//!
//! Starts the bookie node: opens the engine and serves the wire protocol.

use std::sync::Arc;

use clap::Parser;

use bookvault::network::Server;
use bookvault::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// bookvault server
#[derive(Parser, Debug)]
#[command(name = "bookvault-server")]
#[command(about = "Durable storage node for a replicated append-only log")]
#[command(version)]
struct Args {
    /// Data directory for sstables
    #[arg(short, long, default_value = "./bookvault_data")]
    data_dir: String,

    /// Directory for the entry log (defaults to {data_dir}/wal)
    #[arg(short, long)]
    wal_dir: Option<String>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:3181")]
    listen: String,

    /// Host advertised for registration
    #[arg(long, default_value = "127.0.0.1")]
    advertised_host: String,

    /// Port advertised for registration
    #[arg(long, default_value = "3181")]
    advertised_port: u16,

    /// Acknowledge writes without waiting for a journal sync (weaker
    /// durability, lower latency)
    #[arg(long)]
    no_fsync: bool,

    /// Journal sync rate limit (syncs per second)
    #[arg(long, default_value = "5000")]
    sync_rate: f64,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bookvault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let wal_dir = args
        .wal_dir
        .clone()
        .unwrap_or_else(|| format!("{}/wal", args.data_dir));

    tracing::info!("bookvault server v{}", bookvault::VERSION);
    tracing::info!("data directory: {}", args.data_dir);
    tracing::info!("wal directory: {}", wal_dir);
    tracing::info!("listen address: {}", args.listen);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .wal_dir(wal_dir)
        .listen_addr(&args.listen)
        .advertised_addr(&args.advertised_host, args.advertised_port)
        .fsync_journal(!args.no_fsync)
        .journal_sync_rate(args.sync_rate)
        .max_connections(args.max_connections)
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("engine initialized");

    // Shutdown is driven through the server's flag; wire it to a signal
    // handler (e.g. the ctrlc crate) when deploying outside a supervisor
    let mut server = Server::new(config, Arc::clone(&engine));

    if let Err(e) = server.run() {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("engine close failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("server stopped");
}
