//! Response header rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │               REWRITE PROXY                    │
//!                      │                                                │
//!   Client Request     │  ┌─────────┐    ┌──────────┐    ┌──────────┐  │
//!   ───────────────────┼─▶│  trace  │───▶│ rewrite  │───▶│  proxy   │──┼───▶ Upstream
//!                      │  │ + req id│    │middleware│    │ handler  │  │
//!                      │  └─────────┘    └────┬─────┘    └──────────┘  │
//!   Client Response    │                      │ commit: RuleSet runs   │
//!   ◀──────────────────┼──────────────────────┘ over response headers  │
//!                      │                                                │
//!                      │  config (TOML/JSON, hot reload) · observability│
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use header_rewrite_proxy::config::{load_config, ConfigWatcher, ProxyConfig, EXAMPLE_CONFIG};
use header_rewrite_proxy::observability::{logging, metrics};
use header_rewrite_proxy::{HttpServer, RuleSet, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "header-rewrite-proxy")]
#[command(version, about = "Reverse proxy that rewrites response headers with regular expressions")]
struct Args {
    /// Configuration file path (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Reload rewrite rules when the configuration file changes
    #[arg(long)]
    watch: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print example configuration and exit
    #[arg(long)]
    example_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.example_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    logging::init_logging(&level, args.json_logs || config.observability.json_logs);

    tracing::info!(
        instance = %config.name,
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        rewrites = config.rewrites.len(),
        "Configuration loaded"
    );

    if args.validate {
        RuleSet::compile(&config.rewrites)?;
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        // Address already checked by validation when loaded from a file.
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Rules compile before the listener binds.
    let server = HttpServer::new(config.clone())?;

    let (_watcher, config_updates) = match watch_path(&args) {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// File to watch for reloads, if `--watch` can be honoured.
fn watch_path(args: &Args) -> Option<&Path> {
    match (&args.config, args.watch) {
        (Some(path), true) => Some(path.as_path()),
        (None, true) => {
            tracing::warn!("--watch has no effect without --config; rules will not reload");
            None
        }
        _ => None,
    }
}
