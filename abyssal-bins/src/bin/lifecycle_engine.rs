//! Lifecycle Engine binary (§2, §4.4, §4.5, §4.6): submits orders derived
//! from action frames, processes exchange fills and publishes
//! per-execution and trade-closure reports.

use abyssal_bins::common::{init_logging, install_shutdown_signal, spawn_metrics_server, CommonArgs};
use abyssal_core::broker::{self, Consumer, Publisher, Topic};
use abyssal_core::config::Config;
use abyssal_core::exchange::{ExchangeClient, ExchangeEvent, OutboundOrder, SimulatedExchangeClient};
use abyssal_core::frame::{ActionFrame, ActionKind};
use abyssal_core::lifecycle::{FillEvent, LifecycleEngine, PublishedIdGuard, SubmissionOutcome};
use anyhow::Result;
use clap::Parser;
use std::sync::atomic::Ordering;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Route orders through the real OKX client instead of the simulator.
    /// Requires OKX_API_KEY/OKX_SECRET_KEY/OKX_PASSPHRASE.
    #[arg(long)]
    live: bool,

    /// Starting balance used by the sizing policy (§4.4.2), in the
    /// absence of a real balance feed.
    #[arg(long, default_value_t = 10_000.0)]
    starting_balance: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_level)?;
    let shutdown = install_shutdown_signal()?;
    let metrics = spawn_metrics_server(&args.common.metrics_addr)?;

    let config = Config::from_env()?;
    let action_channel = broker::connect(&config.broker.amqp_uri()).await?;
    let mut action_consumer =
        Consumer::bind(action_channel, "oms_action_queue", Topic::OMS_ACTION, "lifecycle-engine").await?;

    let report_channel = broker::connect(&config.broker.amqp_uri()).await?;
    let report_publisher =
        Publisher::declare(report_channel, Topic::EXECUTION_UPDATE, "application/json").await?;

    let (exchange_client, mut exchange_events): (Box<dyn ExchangeClient>, _) = if args.live {
        let exchange_config = abyssal_core::config::ExchangeConfig::from_env()?;
        let (client, events) = abyssal_core::exchange::production::OkxExchangeClient::new(exchange_config);
        (Box::new(client), events)
    } else {
        let (client, events) = SimulatedExchangeClient::new();
        (Box::new(client), events)
    };

    let mut engine = LifecycleEngine::new();
    engine.set_balance(args.starting_balance);
    let mut published = PublishedIdGuard::default();

    tracing::info!(live = args.live, "lifecycle engine ready");
    while !shutdown.load(Ordering::SeqCst) {
        tokio::select! {
            delivery = action_consumer.next() => {
                let Some(delivery) = delivery else { break };
                match delivery {
                    Ok((tag, payload)) => {
                        match ActionFrame::decode(&payload) {
                            Ok(action) => {
                                handle_action(&mut engine, &*exchange_client, &action, &metrics).await;
                                action_consumer.ack(tag).await?;
                            }
                            Err(err) => {
                                tracing::error!(%err, "dropping malformed action frame");
                                action_consumer.nack(tag).await?;
                            }
                        }
                    }
                    Err(err) => tracing::error!(%err, "action consumer error"),
                }
            }
            event = exchange_events.recv() => {
                let Some(event) = event else { continue };
                handle_exchange_event(&mut engine, event, &report_publisher, &metrics, &mut published).await;
            }
        }
    }

    tracing::info!("lifecycle engine shutting down");
    Ok(())
}

async fn handle_action(
    engine: &mut LifecycleEngine,
    exchange_client: &dyn ExchangeClient,
    action: &ActionFrame,
    metrics: &abyssal_core::monitoring::MetricsRegistry,
) {
    let mid_price = action.mid_price_cents as f64 / 100.0;
    match engine.submit_action(action, mid_price) {
        SubmissionOutcome::Submitted(order) => {
            let label = if matches!(order.side, abyssal_core::lifecycle::Side::Buy) {
                "buy"
            } else {
                "sell"
            };
            metrics.lifecycle().orders_submitted_total.with_label_values(&[label]).inc();
            metrics.lifecycle().active_orders.set(engine.active_order_count() as i64);

            let outbound = OutboundOrder {
                local_id: order.local_id,
                side: order.side,
                price: order.intended_price,
                size: order.intended_volume,
                is_market: matches!(action.action_kind, ActionKind::Market),
            };
            exchange_client.submit(outbound).await;
        }
        SubmissionOutcome::DroppedBelowMinimum => {
            tracing::debug!("derived order size below minimum contract, dropped");
        }
        SubmissionOutcome::Rejected(err) => {
            tracing::warn!(%err, "order rejected by sizing policy");
        }
    }
}

async fn handle_exchange_event(
    engine: &mut LifecycleEngine,
    event: ExchangeEvent,
    report_publisher: &Publisher,
    metrics: &abyssal_core::monitoring::MetricsRegistry,
    published: &mut PublishedIdGuard,
) {
    match event {
        ExchangeEvent::OrderAck { local_id, exchange_id } => {
            engine.acknowledge_order(local_id, exchange_id);
        }
        ExchangeEvent::Fill {
            exchange_id,
            cumulative_filled,
            avg_price,
            side,
            fill_time,
        } => {
            let outcome = engine.process_fill(FillEvent {
                exchange_id,
                cumulative_filled,
                avg_price,
                side,
                fill_time,
            });
            metrics.lifecycle().fills_processed_total.inc();
            metrics.lifecycle().active_orders.set(engine.active_order_count() as i64);

            for report in &outcome.per_execution_reports {
                if !published.mark_if_new(report.state_id) {
                    tracing::debug!(state_id = report.state_id, "per-execution report already published, skipping");
                    continue;
                }
                publish_report(report_publisher, metrics, report).await;
            }
            for report in &outcome.closure_reports {
                metrics.lifecycle().reward_per_trade.observe(report.reward);
                publish_report(report_publisher, metrics, report).await;
            }
        }
        ExchangeEvent::Position { unrealised_pnl_ratio } => {
            engine.observe_unrealised_pnl_ratio(unrealised_pnl_ratio);
        }
        ExchangeEvent::Cancel { local_id } => {
            engine.confirm_cancellation(local_id);
        }
    }
}

async fn publish_report<T: serde::Serialize>(
    publisher: &Publisher,
    metrics: &abyssal_core::monitoring::MetricsRegistry,
    report: &T,
) {
    match serde_json::to_vec(report) {
        Ok(bytes) => {
            if publisher.publish(&bytes).await.is_err() {
                metrics.transport().broker_publish_errors_total.inc();
            }
        }
        Err(err) => tracing::error!(%err, "failed to encode execution report"),
    }
}
