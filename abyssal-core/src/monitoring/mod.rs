//! Observability (§3.10, §4.5, §4.6): Prometheus metrics and the HTTP
//! server that exposes them for scraping.

pub mod metrics;
pub mod server;

pub use metrics::{DepthMetrics, LifecycleMetrics, MetricsRegistry, RelayMetrics, TransportMetrics};
pub use server::{MetricsServer, MetricsServerConfig};
