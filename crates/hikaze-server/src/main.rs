//! Hikaze Server - HTTP backend for the Hikaze model manager.
//!
//! Opens the catalog under the data root, optionally kicks off a lazy scan
//! of the configured model roots, and serves the REST API until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use hikaze_core::config::ServerConfig;
use hikaze_core::{AppConfig, HikazeApi};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "hikaze-server")]
#[command(about = "HTTP backend for the Hikaze model manager")]
struct Args {
    /// Host to bind to (overrides config.json)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config.json, 0 = auto-assign)
    #[arg(short, long)]
    port: Option<u16>,

    /// Consecutive ports to try when the port is taken
    #[arg(long, default_value_t = ServerConfig::BIND_TRIES)]
    tries: u16,

    /// Directory holding the catalog database and config.json
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Do not start a scan on boot
    #[arg(long)]
    no_scan: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG wins over --debug when set
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let data_root = args
        .data_root
        .unwrap_or_else(AppConfig::default_data_root);

    let mut config = AppConfig::load(&data_root)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    if args.check {
        // Intentional stdout: consumed by the host plugin's launcher
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "version": env!("CARGO_PKG_VERSION"),
                "host": config.host,
                "port": config.port,
                "model_roots": config.model_roots,
                "data_root": data_root,
            }))?
        );
        return Ok(());
    }

    info!("Starting Hikaze server");
    info!("Data root: {}", data_root.display());

    let host = config.host.clone();
    let port = config.port;
    let api = HikazeApi::builder(&data_root).config(config).build().await?;

    if !args.no_scan && !api.model_roots().is_empty() {
        api.start_scan(None, false);
    }

    let addr = hikaze_server::start_server(api.clone(), &host, port, args.tries).await?;

    // Print port for the launcher to read (intentional stdout)
    println!("HIKAZE_PORT={}", addr.port());

    info!("Hikaze server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping background scan");
    if api.stop_scan() {
        api.wait_for_scan().await;
    }

    Ok(())
}
