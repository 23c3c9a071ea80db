//! Mower fleet backend binary.
//!
//! # Usage
//!
//! ```bash
//! mowerlink-server --registry devices.json
//! mowerlink-server --registry devices.json --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;
use mowerlink_server::{ListenerSupervisor, MemorySink, SystemEnv, registry_file};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Mower fleet protocol backend.
#[derive(Parser, Debug)]
#[command(name = "mowerlink-server")]
#[command(about = "Device-facing protocol engine for a lawnmower fleet backend")]
#[command(version)]
struct Args {
    /// Path to the device registry JSON file.
    #[arg(long)]
    registry: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("mowerlink-server starting");

    let registry = registry_file::load_registry(&args.registry)?;
    let sink = MemorySink::new();
    let env = SystemEnv::new();

    let supervisor = ListenerSupervisor::new(env, registry, sink);
    supervisor.run().await;

    Ok(())
}
