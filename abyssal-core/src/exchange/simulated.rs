//! Simulated exchange client for paper trading and tests (§4.4, §9).
//!
//! Mirrors the teacher's `execution::simulated::SimulatedExecutor`:
//! immediately fills every submitted order at its requested price and
//! pushes the resulting events onto a bounded channel rather than calling
//! back into the caller.

use super::{ExchangeClient, ExchangeEvent, OutboundOrder, SubmitOutcome};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Bounds the event channel so a stalled consumer can't grow the
/// simulator's memory without limit (teacher's `MAX_PENDING_FILLS`
/// pattern in `execution::simulated`).
const EVENT_CHANNEL_CAPACITY: usize = 4096;

pub struct SimulatedExchangeClient {
    events: mpsc::Sender<ExchangeEvent>,
    next_exchange_id: AtomicU64,
}

impl SimulatedExchangeClient {
    /// Returns the client and the receiving half of its event stream.
    pub fn new() -> (Self, mpsc::Receiver<ExchangeEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                events: tx,
                next_exchange_id: AtomicU64::new(1),
            },
            rx,
        )
    }
}

impl Default for SimulatedExchangeClient {
    fn default() -> Self {
        Self::new().0
    }
}

#[async_trait]
impl ExchangeClient for SimulatedExchangeClient {
    async fn submit(&self, order: OutboundOrder) -> SubmitOutcome {
        let exchange_id = format!("sim-{}", self.next_exchange_id.fetch_add(1, Ordering::Relaxed));

        if self
            .events
            .send(ExchangeEvent::OrderAck {
                local_id: order.local_id,
                exchange_id: exchange_id.clone(),
            })
            .await
            .is_err()
        {
            return SubmitOutcome::Rejected {
                reason: "event channel closed".to_string(),
            };
        }

        let _ = self
            .events
            .send(ExchangeEvent::Fill {
                exchange_id,
                cumulative_filled: order.size,
                avg_price: order.price,
                side: order.side,
                fill_time: 0,
            })
            .await;

        SubmitOutcome::Accepted
    }

    async fn cancel(&self, _local_id: u32) {
        // Orders fill synchronously on submit, so there is never anything
        // left in flight to cancel.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Side;

    #[tokio::test]
    async fn submit_emits_ack_then_full_fill() {
        let (client, mut events) = SimulatedExchangeClient::new();
        let outcome = client
            .submit(OutboundOrder {
                local_id: 1,
                side: Side::Buy,
                price: 30000.0,
                size: 1.0,
                is_market: false,
            })
            .await;
        assert_eq!(outcome, SubmitOutcome::Accepted);

        match events.recv().await.unwrap() {
            ExchangeEvent::OrderAck { local_id, .. } => assert_eq!(local_id, 1),
            other => panic!("expected OrderAck, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            ExchangeEvent::Fill { cumulative_filled, .. } => assert_eq!(cumulative_filled, 1.0),
            other => panic!("expected Fill, got {other:?}"),
        }
    }
}
