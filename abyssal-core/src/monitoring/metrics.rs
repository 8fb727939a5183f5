//! Prometheus metrics for the three services (§3.10).
//!
//! One metric family group per service plus a shared transport group,
//! each registered into a single [`Registry`] so all three binaries expose
//! the same `/metrics` shape regardless of which one is running.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    depth: Arc<DepthMetrics>,
    relay: Arc<RelayMetrics>,
    lifecycle: Arc<LifecycleMetrics>,
    transport: Arc<TransportMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());
        let depth = Arc::new(DepthMetrics::new(&registry)?);
        let relay = Arc::new(RelayMetrics::new(&registry)?);
        let lifecycle = Arc::new(LifecycleMetrics::new(&registry)?);
        let transport = Arc::new(TransportMetrics::new(&registry)?);

        info!("Prometheus metrics registry initialized");

        Ok(Self {
            registry,
            depth,
            relay,
            lifecycle,
            transport,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn depth(&self) -> &DepthMetrics {
        &self.depth
    }

    pub fn relay(&self) -> &RelayMetrics {
        &self.relay
    }

    pub fn lifecycle(&self) -> &LifecycleMetrics {
        &self.lifecycle
    }

    pub fn transport(&self) -> &TransportMetrics {
        &self.transport
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("FATAL: failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// Depth Engine metrics (§2, §4.1).
pub struct DepthMetrics {
    /// Snapshots and deltas applied successfully.
    pub updates_applied_total: IntCounterVec,
    /// Sequence-number gaps observed, forcing a resync (§4.1 edge cases).
    pub sequence_gaps_total: IntCounter,
    /// Feature frames published to the broker.
    pub frames_published_total: IntCounter,
    /// Time spent computing one feature frame.
    pub feature_compute_seconds: Histogram,
}

impl DepthMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let updates_applied_total = IntCounterVec::new(
            Opts::new(
                "depth_updates_applied_total",
                "Order book snapshots and deltas applied",
            )
            .namespace("abyssal"),
            &["kind"],
        )?;
        registry.register(Box::new(updates_applied_total.clone()))?;

        let sequence_gaps_total = IntCounter::with_opts(
            Opts::new("depth_sequence_gaps_total", "Sequence-number gaps observed")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(sequence_gaps_total.clone()))?;

        let frames_published_total = IntCounter::with_opts(
            Opts::new(
                "depth_frames_published_total",
                "Feature frames published to the broker",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(frames_published_total.clone()))?;

        let feature_compute_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "depth_feature_compute_seconds",
                "Time to compute one feature frame from the book",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(feature_compute_seconds.clone()))?;

        Ok(Self {
            updates_applied_total,
            sequence_gaps_total,
            frames_published_total,
            feature_compute_seconds,
        })
    }
}

/// Decision Relay metrics (§2, §4.3).
pub struct RelayMetrics {
    /// Feature frames consumed from the broker.
    pub frames_consumed_total: IntCounter,
    /// Decisions requested from the decision function.
    pub decisions_total: IntCounterVec,
    /// OMS actions published.
    pub actions_published_total: IntCounter,
    /// Trade skeletons flushed to the training hook.
    pub skeletons_flushed_total: IntCounter,
    /// Execution reports that could not be matched to an open skeleton.
    pub unmatched_reports_total: IntCounter,
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let frames_consumed_total = IntCounter::with_opts(
            Opts::new(
                "relay_frames_consumed_total",
                "Feature frames consumed from the broker",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(frames_consumed_total.clone()))?;

        let decisions_total = IntCounterVec::new(
            Opts::new("relay_decisions_total", "Decisions returned by the decision function")
                .namespace("abyssal"),
            &["kind"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let actions_published_total = IntCounter::with_opts(
            Opts::new("relay_actions_published_total", "OMS actions published")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(actions_published_total.clone()))?;

        let skeletons_flushed_total = IntCounter::with_opts(
            Opts::new(
                "relay_skeletons_flushed_total",
                "Trade skeletons flushed to the training hook",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(skeletons_flushed_total.clone()))?;

        let unmatched_reports_total = IntCounter::with_opts(
            Opts::new(
                "relay_unmatched_reports_total",
                "Execution reports that matched no open skeleton",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(unmatched_reports_total.clone()))?;

        Ok(Self {
            frames_consumed_total,
            decisions_total,
            actions_published_total,
            skeletons_flushed_total,
            unmatched_reports_total,
        })
    }
}

/// Lifecycle Engine metrics (§2, §4.4).
pub struct LifecycleMetrics {
    /// Orders derived and submitted to the exchange client.
    pub orders_submitted_total: IntCounterVec,
    /// Fills processed.
    pub fills_processed_total: IntCounter,
    /// Trades closed, by direction.
    pub trades_closed_total: IntCounterVec,
    /// Orders currently active (gauge, §4.4.1 `MAX_ACTIVE_ORDERS`).
    pub active_orders: IntGauge,
    /// Reward emitted per closed trade.
    pub reward_per_trade: Histogram,
    /// Execution reports and closure reports re-sent because a prior
    /// publish was never acknowledged (§4.4.6 at-most-once reporting).
    pub duplicate_reports_suppressed_total: IntCounter,
}

impl LifecycleMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let orders_submitted_total = IntCounterVec::new(
            Opts::new("lifecycle_orders_submitted_total", "Orders submitted to the exchange")
                .namespace("abyssal"),
            &["side"],
        )?;
        registry.register(Box::new(orders_submitted_total.clone()))?;

        let fills_processed_total = IntCounter::with_opts(
            Opts::new("lifecycle_fills_processed_total", "Fills processed")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(fills_processed_total.clone()))?;

        let trades_closed_total = IntCounterVec::new(
            Opts::new("lifecycle_trades_closed_total", "Trades closed")
                .namespace("abyssal"),
            &["direction"],
        )?;
        registry.register(Box::new(trades_closed_total.clone()))?;

        let active_orders = IntGauge::with_opts(
            Opts::new("lifecycle_active_orders", "Orders currently active")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(active_orders.clone()))?;

        let reward_per_trade = Histogram::with_opts(
            HistogramOpts::new("lifecycle_reward_per_trade", "Reward emitted per closed trade")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(reward_per_trade.clone()))?;

        let duplicate_reports_suppressed_total = IntCounter::with_opts(
            Opts::new(
                "lifecycle_duplicate_reports_suppressed_total",
                "Reports suppressed by the at-most-once id guard",
            )
            .namespace("abyssal"),
        )?;
        registry.register(Box::new(duplicate_reports_suppressed_total.clone()))?;

        Ok(Self {
            orders_submitted_total,
            fills_processed_total,
            trades_closed_total,
            active_orders,
            reward_per_trade,
            duplicate_reports_suppressed_total,
        })
    }
}

/// Shared transport metrics (§4.5, §4.6, §7): broker and exchange
/// connection health, common to all three binaries.
pub struct TransportMetrics {
    pub broker_reconnects_total: IntCounter,
    pub exchange_reconnects_total: IntCounter,
    pub broker_publish_errors_total: IntCounter,
}

impl TransportMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let broker_reconnects_total = IntCounter::with_opts(
            Opts::new("transport_broker_reconnects_total", "Broker reconnection attempts")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(broker_reconnects_total.clone()))?;

        let exchange_reconnects_total = IntCounter::with_opts(
            Opts::new("transport_exchange_reconnects_total", "Exchange reconnection attempts")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(exchange_reconnects_total.clone()))?;

        let broker_publish_errors_total = IntCounter::with_opts(
            Opts::new("transport_broker_publish_errors_total", "Broker publish failures")
                .namespace("abyssal"),
        )?;
        registry.register(Box::new(broker_publish_errors_total.clone()))?;

        Ok(Self {
            broker_reconnects_total,
            exchange_reconnects_total,
            broker_publish_errors_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_registers_all_families_without_collision() {
        let registry = MetricsRegistry::new().expect("metric names must not collide");
        registry.depth().sequence_gaps_total.inc();
        registry.lifecycle().active_orders.set(3);
        assert_eq!(registry.lifecycle().active_orders.get(), 3);
    }
}
