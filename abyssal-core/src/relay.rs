//! Decision Relay (§2, §4.3): turns feature frames into action frames and
//! correlates later execution reports back to the actions that produced
//! them.
//!
//! The decision function and the training hook are the two external
//! collaborators named in §1 — "the learning component... treated as a
//! black-box decision function `decide(state_window) -> (price_offset,
//! volume_fraction)` plus a training hook `observe(trade_outcome)`". They
//! are modeled here as injected traits, the way the teacher injects a
//! `Strategy` and an `Executor` into its generic `Engine<S, E>`.

use crate::frame::{ActionFrame, ActionKind, FeatureFrame};
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};

/// Frames considered per decision (§4.3).
pub const NETWORK_WINDOW: usize = 80;
/// Size cap on the frame/action ring buffers (§4.3).
pub const BUFFER_CAPACITY: usize = 1000;
/// Number of decisions over which the exploration gate is active (§4.3).
pub const EXPLORATION_DECISIONS: u64 = 1000;

/// One decision produced by the black-box decision function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action_kind: ActionKind,
    pub price_offset: f64,
    pub volume_fraction: f64,
}

/// The learning component's inference half (§1, §4.3).
pub trait DecisionFunction: Send {
    fn decide(&mut self, window: &[FeatureFrame]) -> Decision;
}

/// One completed trade, ready for the training hook (§4.3).
#[derive(Debug, Clone, Default)]
pub struct TradeOutcome {
    pub orders: Vec<SkeletonOrder>,
    pub reward: f64,
}

/// The learning component's training half (§1, §4.3).
pub trait TrainingHook: Send {
    fn observe(&mut self, trade: TradeOutcome);
}

/// An order as reconstructed by the relay from per-execution reports: the
/// exchange id, the 80-frame state-id window the originating decision was
/// made from, and (once known) its execution fraction.
#[derive(Debug, Clone)]
pub struct SkeletonOrder {
    pub exchange_id: String,
    pub state_id: u32,
    pub window_state_ids: Vec<u16>,
    pub execution_fraction: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct TradeSkeleton {
    orders: Vec<SkeletonOrder>,
}

/// Execution reports delivered on the `execution.update` topic (§6.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExecutionReport {
    PerExecution {
        state_id: u32,
        okx_id: String,
        is_trade_closed: bool,
        #[serde(default)]
        execution_percentage: Option<f64>,
    },
    TradeClosure {
        is_trade_closed: bool,
        filled_portions: Vec<HashMap<String, f64>>,
        reward: f64,
    },
}

/// Fixed-capacity ring buffer keyed by `state_id`, evicting the oldest
/// entry once full (§4.3 "last up-to-1000").
struct BoundedRing<T> {
    order: VecDeque<u16>,
    items: HashMap<u16, T>,
    capacity: usize,
}

impl<T> BoundedRing<T> {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            items: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, key: u16, value: T) {
        if !self.items.contains_key(&key) {
            if self.order.len() == self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.items.remove(&oldest);
                }
            }
            self.order.push_back(key);
        }
        self.items.insert(key, value);
    }

    fn get(&self, key: u16) -> Option<&T> {
        self.items.get(&key)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// The relay's mutable state (§4.3).
pub struct DecisionRelay<D, H> {
    frame_window: VecDeque<FeatureFrame>,
    frame_buffer: BoundedRing<()>,
    action_buffer: BoundedRing<ActionFrame>,
    windows_by_state: BoundedRing<Vec<u16>>,
    skeleton: TradeSkeleton,
    decisions_made: u64,
    decision_fn: D,
    training_hook: H,
}

impl<D: DecisionFunction, H: TrainingHook> DecisionRelay<D, H> {
    pub fn new(decision_fn: D, training_hook: H) -> Self {
        Self {
            frame_window: VecDeque::with_capacity(NETWORK_WINDOW),
            frame_buffer: BoundedRing::new(BUFFER_CAPACITY),
            action_buffer: BoundedRing::new(BUFFER_CAPACITY),
            windows_by_state: BoundedRing::new(BUFFER_CAPACITY),
            skeleton: TradeSkeleton::default(),
            decisions_made: 0,
            decision_fn,
            training_hook,
        }
    }

    /// Feed one feature frame through the relay. Returns a freshly minted
    /// action frame if this frame completed an 80-frame window on an
    /// even-parity `state_id` (§4.3).
    pub fn on_feature_frame(&mut self, frame: FeatureFrame) -> Option<ActionFrame> {
        let state_id = frame.sequence_id;
        self.frame_buffer.push(state_id, ());

        if self.frame_window.len() == NETWORK_WINDOW {
            self.frame_window.pop_front();
        }
        self.frame_window.push_back(frame);

        if self.frame_window.len() < NETWORK_WINDOW {
            return None;
        }
        if state_id % 2 != 0 {
            return None;
        }

        let window: Vec<FeatureFrame> = self.frame_window.iter().cloned().collect();
        let window_state_ids: Vec<u16> = window.iter().map(|f| f.sequence_id).collect();
        let mut decision = self.decision_fn.decide(&window);

        if self.decisions_made < EXPLORATION_DECISIONS && rand::thread_rng().gen_bool(0.5) {
            decision.price_offset = -decision.price_offset;
        }
        self.decisions_made += 1;

        let mid_price_cents = (window.last().map(|f| f.mid_price).unwrap_or(0.0) * 100.0)
            .round()
            .clamp(0.0, u32::MAX as f64) as u32;

        let action = ActionFrame {
            action_kind: decision.action_kind,
            price_offset: decision.price_offset,
            volume_fraction: decision.volume_fraction,
            mid_price_cents,
            state_id,
        };

        self.action_buffer.push(state_id, action);
        self.windows_by_state.push(state_id, window_state_ids);

        Some(action)
    }

    /// Process one execution report from the `execution.update` topic
    /// (§4.3).
    pub fn on_execution_report(&mut self, report: ExecutionReport) {
        match report {
            ExecutionReport::PerExecution {
                state_id,
                okx_id,
                is_trade_closed,
                ..
            } => {
                debug_assert!(!is_trade_closed);
                if self
                    .skeleton
                    .orders
                    .iter()
                    .any(|o| o.exchange_id == okx_id)
                {
                    tracing::warn!(okx_id = %okx_id, "duplicate exchange id in trade skeleton, ignoring");
                    return;
                }

                let state_id_u16 = state_id as u16;
                let window_state_ids = self
                    .windows_by_state
                    .get(state_id_u16)
                    .cloned()
                    .unwrap_or_default();
                if self.action_buffer.get(state_id_u16).is_none() {
                    tracing::warn!(state_id, "execution report references unknown action, recording anyway");
                }

                self.skeleton.orders.push(SkeletonOrder {
                    exchange_id: okx_id,
                    state_id,
                    window_state_ids,
                    execution_fraction: None,
                });
            }
            ExecutionReport::TradeClosure {
                filled_portions,
                reward,
                ..
            } => {
                for portion in &filled_portions {
                    for (okx_id, percent) in portion {
                        if let Some(order) = self
                            .skeleton
                            .orders
                            .iter_mut()
                            .find(|o| &o.exchange_id == okx_id)
                        {
                            order.execution_fraction = Some(percent / 100.0);
                        }
                    }
                }

                let trade = TradeOutcome {
                    orders: std::mem::take(&mut self.skeleton.orders),
                    reward,
                };
                self.training_hook.observe(trade);
                self.skeleton = TradeSkeleton::default();
            }
        }
    }

    pub fn frame_buffer_len(&self) -> usize {
        self.frame_buffer.len()
    }

    pub fn decisions_made(&self) -> u64 {
        self.decisions_made
    }
}
