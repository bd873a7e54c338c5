use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fortune_api::config::ServiceConfig;
use fortune_api::fortune::CommandBackend;
use fortune_api::http::{router, HttpServer};
use fortune_api::ratelimit::{ClientRegistry, Sweeper};

/// HTTP API for the fortune command.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }

    info!("Starting Fortune API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(cli.config.as_deref())?;
    info!(
        address = %config.server.address,
        fortune_path = %config.fortune.path,
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();

    let registry = Arc::new(ClientRegistry::with_quota(config.rate_limiting.quota()));
    info!(
        requests_per_second = config.rate_limiting.requests_per_second,
        burst = config.rate_limiting.burst,
        "Rate limiter initialized"
    );

    let sweeper = Sweeper::new(Arc::clone(&registry), shutdown.clone())
        .with_interval(config.rate_limiting.sweep_interval)
        .with_idle_threshold(config.rate_limiting.idle_timeout)
        .spawn();

    let backend = Arc::new(CommandBackend::new(config.fortune.path.clone()));
    let app = router(backend, registry, config.server.request_timeout);
    let server = HttpServer::new(config.server.bind_address(), app)
        .with_shutdown_timeout(config.server.shutdown_timeout);

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let result = server.serve_with_shutdown(shutdown.clone()).await;

    // Stop the sweeper even if the server failed to start.
    shutdown.cancel();
    sweeper.await?;

    result?;
    info!("Fortune API stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
