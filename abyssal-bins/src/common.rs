//! Shared CLI parsing and bootstrap code for the three service binaries.

use abyssal_core::monitoring::{MetricsRegistry, MetricsServer, MetricsServerConfig};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI arguments common to all three binaries.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Address the Prometheus /metrics endpoint binds to.
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub metrics_addr: String,

    /// Log level, overridden by `RUST_LOG` if set.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Initialize `tracing` the way the teacher does: `RUST_LOG` wins over the
/// CLI flag, JSON-less human output to stdout.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}

/// Build the metrics registry and spawn its HTTP server on `addr`; returns
/// the registry so callers can record against it.
pub fn spawn_metrics_server(addr: &str) -> Result<Arc<MetricsRegistry>> {
    let registry = Arc::new(MetricsRegistry::new()?);
    let config = MetricsServerConfig {
        listen_addr: addr.parse()?,
        metrics_path: "/metrics".to_string(),
    };
    let server = MetricsServer::new(config, registry.clone());
    tokio::spawn(async move {
        if let Err(err) = server.serve().await {
            tracing::error!(%err, "metrics server exited");
        }
    });
    Ok(registry)
}

/// Install a Ctrl-C handler that flips `shutdown` to `true`; every binary's
/// main loop polls it once per iteration (§5 bootstrap).
pub fn install_shutdown_signal() -> Result<Arc<std::sync::atomic::AtomicBool>> {
    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("shutdown signal received");
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;
    Ok(shutdown)
}
