//! Image relay server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     IMAGE RELAY                       │
//!   POST /api/generate │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ───────────────────┼─▶│   http   │──▶│validator │──▶│     encoder      │  │
//!                      │  │  server  │   └──────────┘   └────────┬─────────┘  │
//!                      │  └──────────┘                           ▼            │
//!                      │       ▲          ┌──────────┐   ┌──────────────────┐  │     Upstream
//!                      │       │          │normalizer│◀──│    dispatcher    │◀─┼───▶ service
//!                      │       │          └────┬─────┘   │ shapes × retries │  │
//!                      │       │               ▼         └──────────────────┘  │
//!   { result_url,      │  ┌────┴─────────────────────┐                         │
//!     data_url }       │  │       materializer       │◀────────────────────────┼───▶ result URL
//!   ◀──────────────────┼──│  (inline or fetched)     │                         │
//!                      │  └──────────────────────────┘                         │
//!                      │   config · observability · resilience · lifecycle    │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use image_relay::config::loader::load_config;
use image_relay::config::validation::{validate_config, worst_case_invocation};
use image_relay::observability::{logging, metrics};
use image_relay::{HttpServer, RelayConfig, Shutdown};

#[derive(Parser)]
#[command(name = "image-relay")]
#[command(about = "Relays images to the upstream transformation service", long_about = None)]
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

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(|errors| {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })?;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("image-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.upstream.endpoint,
        attempt_timeout_secs = config.upstream.attempt_timeout_secs,
        max_attempts = config.retries.max_attempts,
        credential_env = %config.upstream.credential_env,
        "Configuration loaded"
    );

    let worst_case = worst_case_invocation(&config);
    if worst_case > config.listener.invocation_deadline() {
        tracing::warn!(
            deadline = ?config.listener.invocation_deadline(),
            worst_case = ?worst_case,
            "Retries can outlast the invocation deadline; such requests end in 504"
        );
    }

    if std::env::var(&config.upstream.credential_env).is_err() && config.upstream.api_key.is_none() {
        tracing::warn!(
            credential_env = %config.upstream.credential_env,
            "Upstream credential not set; requests will fail until it is"
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
