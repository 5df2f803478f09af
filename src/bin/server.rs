//! DequeKV Server Binary
//!
//! Starts the TCP server for DequeKV.

use std::sync::Arc;

use clap::Parser;
use dequekv::network::Server;
use dequekv::{Config, Engine, WalSyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// DequeKV Server
#[derive(Parser, Debug)]
#[command(name = "dequekv-server")]
#[command(about = "Key-value server with double-ended lists")]
#[command(version)]
struct Args {
    /// Data directory (WAL lives here)
    #[arg(short, long, default_value = "./dequekv_data", conflicts_with = "in_memory")]
    data_dir: String,

    /// Keep everything in memory; nothing is written to disk
    #[arg(long)]
    in_memory: bool,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// fsync the WAL after every commit
    #[arg(long)]
    sync_every_write: bool,

    /// fsync the WAL after this many commits
    #[arg(long, default_value = "100")]
    sync_every: usize,

    /// WAL size in MB that triggers compaction
    #[arg(long, default_value = "64")]
    wal_compact_mb: u64,

    /// Idle read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dequekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("DequeKV Server v{}", dequekv::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = if args.sync_every_write {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::EveryNEntries {
            count: args.sync_every.max(1),
        }
    };

    let mut builder = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .wal_sync_strategy(sync_strategy)
        .wal_compact_threshold(args.wal_compact_mb * 1024 * 1024)
        .read_timeout_ms(args.read_timeout_ms);

    builder = if args.in_memory {
        tracing::info!("Storage: in-memory");
        builder.in_memory()
    } else {
        tracing::info!("Data directory: {}", args.data_dir);
        builder.data_dir(&args.data_dir)
    };
    let config = builder.build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(config, Arc::clone(&engine));
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    drop(server);
    match Arc::try_unwrap(engine) {
        Ok(engine) => {
            if let Err(e) = engine.close() {
                tracing::error!("Failed to close engine: {}", e);
            }
        }
        Err(engine) => {
            if let Err(e) = engine.store().sync() {
                tracing::error!("Failed to sync WAL: {}", e);
            }
        }
    }

    tracing::info!("Server stopped");
}
