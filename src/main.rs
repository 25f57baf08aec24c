//! APM workload generator (v1)
//!
//! A synthetic HTTP workload built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                    WORKLOAD SERVICE                      │
//!                              │                                                          │
//!     Client Request           │  ┌─────────────┐    ┌──────────────┐    ┌────────────┐   │
//!     ─────────────────────────┼─▶│ correlation │───▶│  endpoints   │───▶│   faults   │   │
//!                              │  │ middleware  │    │  + admin     │    │   policy   │   │
//!                              │  └─────────────┘    └──────┬───────┘    └────────────┘   │
//!                              │                            │                             │
//!                              │                            ▼                             │
//!     Client Response          │  ┌─────────────┐    ┌──────────────┐    ┌────────────┐   │
//!     ◀────────────────────────┼──│  response   │◀───│    errors    │    │  external  │◀──┼──── Upstream
//!                              │  │   mapper    │    │   taxonomy   │    │  service   │   │     API
//!                              │  └─────────────┘    └──────────────┘    └────────────┘   │
//!                              │                                                          │
//!                              │  ┌────────────────────────────────────────────────────┐  │
//!                              │  │              Cross-Cutting Concerns                │  │
//!                              │  │  ┌─────────┐ ┌──────────────────┐ ┌─────────────┐  │  │
//!                              │  │  │ config  │ │  observability   │ │  lifecycle  │  │  │
//!                              │  │  │ +reload │ │ emitter + sinks  │ │  shutdown   │  │  │
//!                              │  │  └─────────┘ └──────────────────┘ └─────────────┘  │  │
//!                              │  └────────────────────────────────────────────────────┘  │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use apm_workload::config::{load_or_default, ConfigWatcher};
use apm_workload::http::HttpServer;
use apm_workload::lifecycle::{signals, Shutdown, StartupError};
use apm_workload::net::tls::load_tls_config;
use apm_workload::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "apm-workload")]
#[command(about = "Synthetic workload generator for APM and log-correlation testing", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_tracing(&config.observability)?;
    tracing::info!("apm-workload v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        error_rate = config.faults.default_error_rate,
        request_timeout_secs = config.timeouts.request_secs,
        file_sink = config.observability.file.enabled,
        "Configuration loaded"
    );

    let server = HttpServer::new(&config)?;

    // Hot reload only makes sense with a file to watch.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        trigger.trigger();
    });

    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            let tls_config = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                .await
                .map_err(StartupError::Tls)?;
            server.run_tls(addr, tls_config, config_updates, server_shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, config_updates, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
