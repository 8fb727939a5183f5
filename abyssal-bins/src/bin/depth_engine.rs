//! Depth Engine binary (§2, §4.1, §4.5): ingests the exchange's
//! differential depth feed and publishes feature frames to the broker.
//!
//! The upstream WebSocket feed itself is an external collaborator out of
//! scope for this crate; this binary reads newline-delimited depth-feed
//! JSON from stdin as the concrete feed source, so the engine, codec and
//! broker publish path are exercised end to end without a live exchange
//! connection. A production deployment replaces `read_depth_frames` with
//! a real WebSocket client feeding the same channel.

use abyssal_bins::common::{init_logging, install_shutdown_signal, spawn_metrics_server, CommonArgs};
use abyssal_core::broker::{self, Publisher, Topic};
use abyssal_core::config::Config;
use abyssal_core::depth_engine::{DepthEngine, DepthEngineOutcome};
use anyhow::Result;
use clap::Parser;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args.log_level)?;
    let shutdown = install_shutdown_signal()?;
    let metrics = spawn_metrics_server(&args.metrics_addr)?;

    let config = Config::from_env()?;
    tracing::info!(host = %config.broker.host, "connecting to broker");
    let channel = broker::connect(&config.broker.amqp_uri()).await?;
    let publisher = Publisher::declare(channel, Topic::ORDERBOOK, "application/octet-stream").await?;

    let mut engine = DepthEngine::new();
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    tracing::info!("depth engine ready, reading depth frames from stdin");
    while !shutdown.load(Ordering::SeqCst) {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => continue,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match engine.ingest_json(&line) {
            DepthEngineOutcome::Emitted(frame) => {
                metrics
                    .depth()
                    .updates_applied_total
                    .with_label_values(&["frame"])
                    .inc();
                if let Err(err) = publisher.publish(&frame.encode()).await {
                    metrics.transport().broker_publish_errors_total.inc();
                    tracing::error!(%err, "failed to publish feature frame");
                } else {
                    metrics.depth().frames_published_total.inc();
                }
            }
            DepthEngineOutcome::Malformed => {
                tracing::warn!("dropped malformed depth frame");
            }
            DepthEngineOutcome::InvariantViolation(err) => {
                metrics.depth().sequence_gaps_total.inc();
                tracing::error!(%err, "book invariant violated, awaiting re-snapshot");
            }
        }
    }

    tracing::info!("depth engine shutting down");
    Ok(())
}
