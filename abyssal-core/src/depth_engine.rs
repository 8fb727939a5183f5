//! Depth Engine (§2, §4.1): turns the exchange's differential depth feed
//! into a dense book and a stream of [`FeatureFrame`]s.

use crate::book::OrderBook;
use crate::errors::BookError;
use crate::frame::FeatureFrame;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// One raw depth-feed level: `[price, size, deprecated, order_count]`, all
/// strings (§4.1).
#[derive(Debug, Clone, Deserialize)]
pub struct RawLevel(pub String, pub String, pub String, pub String);

/// The exchange's depth-feed envelope (§4.1).
#[derive(Debug, Clone, Deserialize)]
pub struct DepthFrame {
    pub action: DepthAction,
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthAction {
    Snapshot,
    Update,
}

/// Counters surfaced to the monitoring module (§4.1 additions).
#[derive(Debug, Default)]
pub struct DepthEngineStats {
    pub frames_applied: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub frames_malformed: AtomicU64,
    pub resnapshots_required: AtomicU64,
}

impl DepthEngineStats {
    fn record_applied(&self) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
    }
    fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }
    fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }
    fn record_resnapshot(&self) {
        self.resnapshots_required.fetch_add(1, Ordering::Relaxed);
    }
}

/// Parse one side's raw string levels into `(price, volume, order_count)`
/// triples. Accepts signed decimals with an optional exponent (§4.1).
fn parse_side(levels: &[RawLevel]) -> Result<Vec<(f64, f64, f64)>, BookError> {
    levels
        .iter()
        .map(|RawLevel(price, size, _deprecated, order_count)| {
            let price: f64 = price
                .parse()
                .map_err(|_| BookError::MalformedFrame(format!("bad price {price:?}")))?;
            let size: f64 = size
                .parse()
                .map_err(|_| BookError::MalformedFrame(format!("bad size {size:?}")))?;
            let order_count: f64 = order_count
                .parse()
                .map_err(|_| BookError::MalformedFrame(format!("bad order count {order_count:?}")))?;
            Ok((price, size, order_count))
        })
        .collect()
}

/// Outcome of feeding one raw JSON message to the engine.
pub enum DepthEngineOutcome {
    /// The frame was applied; a new feature frame was emitted.
    Emitted(FeatureFrame),
    /// The JSON was malformed; the message was dropped (§7).
    Malformed,
    /// The frame was syntactically valid but violated the book's
    /// invariants; the session must reconnect and re-snapshot (§7).
    InvariantViolation(BookError),
}

/// Owns the book and the rolling sequence id. A single thread should hold
/// `&mut DepthEngine` at a time (§5).
pub struct DepthEngine {
    book: OrderBook,
    sequence_id: u16,
    pub stats: DepthEngineStats,
}

impl Default for DepthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthEngine {
    pub fn new() -> Self {
        Self {
            book: OrderBook::new(),
            sequence_id: 0,
            stats: DepthEngineStats::default(),
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    /// Feed one raw JSON message through the engine (§4.1, §7).
    pub fn ingest_json(&mut self, raw: &str) -> DepthEngineOutcome {
        let frame: DepthFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "dropping malformed depth frame");
                self.stats.record_malformed();
                return DepthEngineOutcome::Malformed;
            }
        };
        self.ingest(frame)
    }

    /// Feed one already-parsed [`DepthFrame`] through the engine.
    pub fn ingest(&mut self, frame: DepthFrame) -> DepthEngineOutcome {
        let bids = match parse_side(&frame.bids) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%err, "dropping depth frame with unparsable levels");
                self.stats.record_malformed();
                return DepthEngineOutcome::Malformed;
            }
        };
        let asks = match parse_side(&frame.asks) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(%err, "dropping depth frame with unparsable levels");
                self.stats.record_malformed();
                return DepthEngineOutcome::Malformed;
            }
        };

        let result = match frame.action {
            DepthAction::Snapshot => {
                self.sequence_id = 0;
                self.book.apply_snapshot(&bids, &asks)
            }
            DepthAction::Update => self.book.apply_update(&bids, &asks),
        };

        match result {
            Ok(()) => {
                self.stats.record_applied();
                let emitted = FeatureFrame::from_book(&self.book, self.sequence_id);
                self.sequence_id = self.sequence_id.wrapping_add(1);
                DepthEngineOutcome::Emitted(emitted)
            }
            Err(err) => {
                tracing::error!(%err, "book invariant violated, re-snapshot required");
                self.stats.record_rejected();
                self.stats.record_resnapshot();
                DepthEngineOutcome::InvariantViolation(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json(levels: usize) -> String {
        let mut bids = Vec::with_capacity(levels);
        let mut asks = Vec::with_capacity(levels);
        for i in 0..levels {
            let bid_price = 100.0 - i as f64 * 0.01;
            let ask_price = 100.02 + i as f64 * 0.01;
            bids.push(format!("[\"{bid_price}\",\"1.0\",\"0\",\"1\"]"));
            asks.push(format!("[\"{ask_price}\",\"1.0\",\"0\",\"1\"]"));
        }
        format!(
            "{{\"action\":\"snapshot\",\"bids\":[{}],\"asks\":[{}]}}",
            bids.join(","),
            asks.join(",")
        )
    }

    #[test]
    fn snapshot_emits_sequence_zero() {
        let mut engine = DepthEngine::new();
        match engine.ingest_json(&snapshot_json(400)) {
            DepthEngineOutcome::Emitted(frame) => assert_eq!(frame.sequence_id, 0),
            _ => panic!("expected emitted frame"),
        }
        assert_eq!(engine.sequence_id(), 1);
    }

    #[test]
    fn malformed_json_is_dropped_without_state_change() {
        let mut engine = DepthEngine::new();
        engine.ingest_json(&snapshot_json(400));
        let seq_before = engine.sequence_id();
        match engine.ingest_json("not json") {
            DepthEngineOutcome::Malformed => {}
            _ => panic!("expected malformed outcome"),
        }
        assert_eq!(engine.sequence_id(), seq_before);
    }

    #[test]
    fn sequence_id_wraps_modulo_2_16() {
        let mut engine = DepthEngine::new();
        engine.ingest_json(&snapshot_json(400));
        for _ in 0..u16::MAX as u32 {
            let update = "{\"action\":\"update\",\"bids\":[],\"asks\":[]}";
            engine.ingest_json(update);
        }
        assert_eq!(engine.sequence_id(), 0);
    }

    #[test]
    fn snapshot_restarts_sequence() {
        let mut engine = DepthEngine::new();
        engine.ingest_json(&snapshot_json(400));
        engine.ingest_json("{\"action\":\"update\",\"bids\":[],\"asks\":[]}");
        engine.ingest_json(&snapshot_json(400));
        assert_eq!(engine.sequence_id(), 1);
    }

    #[test]
    fn level_count_violation_requires_resnapshot() {
        let mut engine = DepthEngine::new();
        engine.ingest_json(&snapshot_json(400));
        let bad_snapshot = "{\"action\":\"snapshot\",\"bids\":[[\"100\",\"1\",\"0\",\"1\"]],\"asks\":[]}";
        match engine.ingest_json(bad_snapshot) {
            DepthEngineOutcome::InvariantViolation(_) => {}
            _ => panic!("expected invariant violation"),
        }
        assert_eq!(engine.stats.resnapshots_required.load(Ordering::Relaxed), 1);
    }
}
