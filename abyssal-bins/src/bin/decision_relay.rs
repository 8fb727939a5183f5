//! Decision Relay binary (§2, §4.3, §4.5): turns feature frames into
//! action frames via the injected decision function, and correlates
//! execution reports back into trade outcomes for the injected training
//! hook.
//!
//! The decision function and training hook are the external black-box
//! learning component (§1); this binary wires in a passthrough decision
//! function and a logging training hook so the relay's windowing,
//! exploration gate and skeleton bookkeeping run end to end without it.

use abyssal_bins::common::{init_logging, install_shutdown_signal, spawn_metrics_server, CommonArgs};
use abyssal_core::broker::{self, Consumer, Publisher, Topic};
use abyssal_core::config::Config;
use abyssal_core::frame::{ActionKind, FeatureFrame};
use abyssal_core::relay::{Decision, DecisionFunction, DecisionRelay, ExecutionReport, TradeOutcome, TrainingHook};
use anyhow::Result;
use clap::Parser;
use std::sync::atomic::Ordering;

/// Always quotes half the best spread at unit size. A stand-in for the
/// real model, which observes the same 80-frame window over the wire
/// (§1, §4.3).
struct PassthroughDecision;

impl DecisionFunction for PassthroughDecision {
    fn decide(&mut self, _window: &[FeatureFrame]) -> Decision {
        Decision {
            action_kind: ActionKind::Limit,
            price_offset: 0.0,
            volume_fraction: 0.01,
        }
    }
}

struct LoggingTrainingHook;

impl TrainingHook for LoggingTrainingHook {
    fn observe(&mut self, trade: TradeOutcome) {
        tracing::info!(orders = trade.orders.len(), reward = trade.reward, "trade outcome observed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args.log_level)?;
    let shutdown = install_shutdown_signal()?;
    let metrics = spawn_metrics_server(&args.metrics_addr)?;

    let config = Config::from_env()?;
    let frame_channel = broker::connect(&config.broker.amqp_uri()).await?;
    let mut frame_consumer = Consumer::bind(frame_channel, "ppo_queue", Topic::ORDERBOOK, "decision-relay").await?;

    let action_channel = broker::connect(&config.broker.amqp_uri()).await?;
    let action_publisher = Publisher::declare(action_channel, Topic::OMS_ACTION, "application/octet-stream").await?;

    let execution_channel = broker::connect(&config.broker.amqp_uri()).await?;
    let mut execution_consumer = Consumer::bind(
        execution_channel,
        "ppo_execution_queue",
        Topic::EXECUTION_UPDATE,
        "decision-relay-execution",
    )
    .await?;

    let mut relay = DecisionRelay::new(PassthroughDecision, LoggingTrainingHook);

    tracing::info!("decision relay ready");
    while !shutdown.load(Ordering::SeqCst) {
        tokio::select! {
            delivery = frame_consumer.next() => {
                let Some(delivery) = delivery else { break };
                match delivery {
                    Ok((tag, payload)) => {
                        match FeatureFrame::decode(&payload) {
                            Ok(frame) => {
                                metrics.relay().frames_consumed_total.inc();
                                if let Some(action) = relay.on_feature_frame(frame) {
                                    match action.encode() {
                                        Ok(bytes) => {
                                            if action_publisher.publish(&bytes).await.is_ok() {
                                                metrics.relay().actions_published_total.inc();
                                            } else {
                                                metrics.transport().broker_publish_errors_total.inc();
                                            }
                                        }
                                        Err(err) => tracing::error!(%err, "failed to encode action frame"),
                                    }
                                }
                                frame_consumer.ack(tag).await?;
                            }
                            Err(err) => {
                                tracing::error!(%err, "dropping malformed feature frame");
                                frame_consumer.nack(tag).await?;
                            }
                        }
                    }
                    Err(err) => tracing::error!(%err, "frame consumer error"),
                }
            }
            delivery = execution_consumer.next() => {
                let Some(delivery) = delivery else { continue };
                match delivery {
                    Ok((tag, payload)) => {
                        match serde_json::from_slice::<ExecutionReport>(&payload) {
                            Ok(report) => {
                                if matches!(report, ExecutionReport::TradeClosure { .. }) {
                                    metrics.relay().skeletons_flushed_total.inc();
                                }
                                relay.on_execution_report(report);
                                execution_consumer.ack(tag).await?;
                            }
                            Err(err) => {
                                tracing::error!(%err, "dropping malformed execution report");
                                execution_consumer.nack(tag).await?;
                            }
                        }
                    }
                    Err(err) => tracing::error!(%err, "execution consumer error"),
                }
            }
        }
    }

    tracing::info!("decision relay shutting down");
    Ok(())
}
