//! Mythic HTTP C2 profile listener.
//!
//! Runs one HTTP(S) listener per configured instance and relays agent
//! traffic to the Mythic server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────┐
//!                        │            mythic_http_server              │
//!                        │                                            │
//!     Agent request      │  ┌─────────┐    ┌─────────┐    ┌─────────┐ │
//!     ───────────────────┼─▶│   net   │───▶│  http   │───▶│ routing │ │
//!                        │  │listener │    │middleware│   │  table  │ │
//!                        │  │  + tls  │    │  chain  │    └────┬────┘ │
//!                        │  └─────────┘    └─────────┘         │      │
//!                        │                                     ▼      │
//!     Agent response     │                              ┌──────────┐  │
//!     ◀──────────────────┼──────────────────────────────│ forward  │◀─┼──── Mythic
//!                        │                              └──────────┘  │     server
//!                        │                                            │
//!                        │  config · lifecycle · observability        │
//!                        └────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mythic_http::config::{load_or_default, loader::default_config_path, validate_config, BackendConfig};
use mythic_http::lifecycle::Supervisor;
use mythic_http::net::tls::install_crypto_provider;
use mythic_http::observability::init_tracing;

#[derive(Parser)]
#[command(name = "mythic_http_server")]
#[command(about = "HTTP C2 profile listener for Mythic", long_about = None)]
struct Cli {
    /// Config file; defaults to config.json next to the executable.
    #[arg(short, long, env = "MYTHIC_HTTP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MYTHIC_SERVER_HOST", default_value = "127.0.0.1")]
    mythic_server_host: String,

    #[arg(long, env = "MYTHIC_SERVER_PORT", default_value_t = 17443)]
    mythic_server_port: u16,

    #[arg(long, env = "MYTHIC_SERVER_SCHEME", default_value = "http")]
    mythic_server_scheme: String,

    #[arg(long, env = "DEBUG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seconds each listener may spend draining on shutdown.
    #[arg(long, default_value_t = 10)]
    shutdown_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    install_crypto_provider();

    tracing::info!("mythic_http_server v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = load_or_default(&config_path)?;

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s) in {}", errors.len(), config_path.display()).into());
    }

    let backend = BackendConfig {
        scheme: cli.mythic_server_scheme,
        host: cli.mythic_server_host,
        port: cli.mythic_server_port,
    };

    tracing::info!(
        path = %config_path.display(),
        instances = config.instances.len(),
        backend = %backend.authority(),
        "Configuration loaded"
    );

    let supervisor = Supervisor::launch(
        &config,
        &backend,
        Duration::from_secs(cli.shutdown_timeout_secs),
    )
    .await
    .inspect_err(|e| tracing::error!(error = %e, "Failed to start webservers"))?;

    supervisor
        .run()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Webserver failed"))?;

    Ok(())
}
