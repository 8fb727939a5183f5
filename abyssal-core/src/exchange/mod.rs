//! Exchange transport (§4.6, §6.3, §9 design note).
//!
//! The upstream code wires the exchange client straight into the
//! Lifecycle Engine through a callback, which makes the two cyclically
//! dependent: the client calls back into Lifecycle on fills, and
//! Lifecycle pushes orders into the client's send queue. §9 breaks that
//! cycle by modelling the exchange client as a stateful actor behind one
//! trait: [`ExchangeClient::submit`] is the only way in, [`ExchangeEvent`]
//! is the only way out. Lifecycle holds a `Box<dyn ExchangeClient>` and
//! never needs a back-pointer.

pub mod okx;
pub mod production;
pub mod simulated;

use crate::lifecycle::Side;
use async_trait::async_trait;

pub use simulated::SimulatedExchangeClient;

/// One order as submitted to the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundOrder {
    pub local_id: u32,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub is_market: bool,
}

/// Immediate result of [`ExchangeClient::submit`]. The exchange-assigned
/// id, if any, arrives later as [`ExchangeEvent::OrderAck`] — submission
/// is fire-and-forget from the caller's perspective (§4.4.1 step 5).
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected { reason: String },
}

/// Events the exchange client emits on its event stream (§9).
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    /// The exchange assigned a server-side id to `local_id` (§3.9: order
    /// transitions `pending -> live`).
    OrderAck { local_id: u32, exchange_id: String },
    /// One fill report (§4.4.3 inputs).
    Fill {
        exchange_id: String,
        cumulative_filled: f64,
        avg_price: f64,
        side: Side,
        fill_time: i64,
    },
    /// A sample on the position channel, used to drive `maxdd` tracking
    /// (§4.4.4).
    Position { unrealised_pnl_ratio: f64 },
    /// Positive confirmation of a previously requested cancel (§4.4.5).
    Cancel { local_id: u32 },
}

/// The exchange client's submission half (§9). The event stream half is
/// intentionally not part of this trait — implementations expose it as an
/// `mpsc::Receiver<ExchangeEvent>` returned from construction, so Lifecycle
/// owns a plain channel rather than a callback object.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn submit(&self, order: OutboundOrder) -> SubmitOutcome;
    async fn cancel(&self, local_id: u32);
}
