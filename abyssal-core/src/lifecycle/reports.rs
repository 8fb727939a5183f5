//! Outbound execution-report JSON (§6.2).

use serde::Serialize;
use std::collections::HashMap;

/// A per-execution report, published at most once per `state_id` (§3.8,
/// §6.2).
#[derive(Debug, Clone, Serialize)]
pub struct PerExecutionReport {
    pub state_id: u32,
    pub okx_id: String,
    pub is_trade_closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_percentage: Option<f64>,
}

impl PerExecutionReport {
    pub fn new(state_id: u32, okx_id: String, execution_fraction: f64) -> Self {
        Self {
            state_id,
            okx_id,
            is_trade_closed: false,
            execution_percentage: Some(execution_fraction),
        }
    }
}

/// A trade-closure report, published once per trade at the moment
/// `|net_size|` crosses epsilon (§3.8, §6.2). `filled_portions` values are
/// percent (0-100), intentionally distinct from `execution_percentage`'s
/// fraction on [`PerExecutionReport`] (§9 open question).
#[derive(Debug, Clone, Serialize)]
pub struct TradeClosureReport {
    pub is_trade_closed: bool,
    pub filled_portions: Vec<HashMap<String, f64>>,
    pub reward: f64,
}

impl TradeClosureReport {
    pub fn new(filled_portions: Vec<HashMap<String, f64>>, reward: f64) -> Self {
        Self {
            is_trade_closed: true,
            filled_portions,
            reward,
        }
    }
}

/// Bounded set tracking which `state_id`s have already had a
/// per-execution report published, enforcing the at-most-once guarantee
/// (§3.8) without growing unbounded (§9 open question: bound via LRU over
/// the last 2^16 ids).
pub struct PublishedIdGuard {
    order: std::collections::VecDeque<u32>,
    seen: std::collections::HashSet<u32>,
    capacity: usize,
}

impl PublishedIdGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: std::collections::VecDeque::with_capacity(capacity),
            seen: std::collections::HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns `true` if this is the first time `state_id` has been
    /// marked published (caller should publish); `false` if it was
    /// already seen (caller must skip to preserve at-most-once).
    pub fn mark_if_new(&mut self, state_id: u32) -> bool {
        if self.seen.contains(&state_id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(state_id);
        self.seen.insert(state_id);
        true
    }
}

impl Default for PublishedIdGuard {
    fn default() -> Self {
        Self::new(1 << 16)
    }
}
