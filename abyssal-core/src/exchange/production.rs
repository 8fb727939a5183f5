//! OKX production exchange client stub (§4.6, §9).
//!
//! The real private WebSocket connection, order placement and fill stream
//! are an external collaborator out of scope for this crate (§1 Non-goals:
//! "upstream exchange WebSocket feeds"). This stub carries the real login
//! signing (`okx::sign_login`) and logs every call it would make, so the
//! wiring in `abyssal-bins` is exercised end to end without a live
//! connection.
//!
//! TODO: replace the body of `submit`/`cancel` with real OKX REST/WS calls
//! once exchange credentials for an integration environment exist.

use super::okx::LoginFrame;
use super::{ExchangeClient, ExchangeEvent, OutboundOrder, SubmitOutcome};
use crate::config::ExchangeConfig;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 4096;

pub struct OkxExchangeClient {
    config: ExchangeConfig,
    events: mpsc::Sender<ExchangeEvent>,
}

impl OkxExchangeClient {
    pub fn new(config: ExchangeConfig) -> (Self, mpsc::Receiver<ExchangeEvent>) {
        warn!("OkxExchangeClient is a STUB implementation - no real orders will be placed!");
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { config, events: tx }, rx)
    }

    /// Builds the login frame that would open the private WebSocket
    /// session; not yet sent anywhere.
    fn login_frame(&self, timestamp: &str) -> LoginFrame {
        LoginFrame::new(
            &self.config.api_key,
            &self.config.passphrase,
            &self.config.secret_key,
            timestamp,
        )
    }
}

#[async_trait]
impl ExchangeClient for OkxExchangeClient {
    async fn submit(&self, order: OutboundOrder) -> SubmitOutcome {
        info!(
            local_id = order.local_id,
            side = ?order.side,
            price = order.price,
            size = order.size,
            "STUB: would submit order to OKX private channel"
        );
        let _login = self.login_frame("0");

        warn!(
            local_id = order.local_id,
            "STUB: order logged but not sent to OKX"
        );
        if self.events.capacity() == 0 {
            return SubmitOutcome::Rejected {
                reason: "event channel full".to_string(),
            };
        }
        SubmitOutcome::Accepted
    }

    async fn cancel(&self, local_id: u32) {
        info!(local_id, "STUB: would cancel order on OKX private channel");
    }
}
