//! Lifecycle Engine (§2, §4.4): owns the authoritative order book of our
//! submitted orders, the current trade, and a reserved follow-on trade.
//!
//! This is the most intricate component — order submission derives size
//! and side from an action frame, the position-sizing policy bounds
//! per-side exposure, and fill processing decomposes every exchange
//! report into the closing and opening portions of the trade it affects
//! (§4.4.3, driven by [`super::fsm::decompose`]).

use super::fsm::{decompose, LifecycleEvent, TradeState, Transition, MIN_OPENING_SIZE};
use super::order::{FillPortion, Order, OrderState, Side};
use super::reports::{PerExecutionReport, TradeClosureReport};
use super::sizing;
use super::trade::{Direction, Trade};
use crate::errors::SizingError;
use crate::frame::{ActionFrame, ActionKind};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Leverage applied to submitted order sizing (§4.4.1).
pub const LEVERAGE: f64 = 100.0;
/// Orders below this size are dropped silently (§4.4.1).
pub const MIN_CONTRACT: f64 = 0.1;
/// Active-orders deque size that triggers oldest-order cancellation
/// (§4.4.1).
pub const MAX_ACTIVE_ORDERS: usize = 300;
/// Net-position epsilon below which a trade is considered closed (§3.8).
pub const NET_SIZE_EPSILON: f64 = 1e-8;
/// Fill-delta epsilon below which a reported fill is ignored (§4.4.3).
pub const FILL_EPSILON: f64 = 1e-8;

/// Which in-progress trade a just-processed fill's order snapshot should
/// be folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeTarget {
    Current,
    Next,
}

fn fraction_to_side(price_offset: f64) -> Side {
    if price_offset < 0.0 {
        Side::Buy
    } else {
        Side::Sell
    }
}

/// A submission derived from a decoded action frame (§4.4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedOrder {
    pub order_price: f64,
    pub side: Side,
    pub is_market: bool,
    pub size: f64,
}

/// Derive `(order_price, side, order_type, size)` from a decoded action
/// frame and the latest known balance and mid price (§4.4.1 steps 1-2).
pub fn derive_order(action: &ActionFrame, balance: f64) -> DerivedOrder {
    let mid = action.mid_price_cents as f64 / 100.0;
    let order_price = mid * (1.0 + action.price_offset / 1000.0);
    let side = fraction_to_side(action.price_offset);
    let is_market = matches!(action.action_kind, ActionKind::Market);
    let notional_margin = balance * 0.001 * action.volume_fraction;
    let size = (10.0 * LEVERAGE * notional_margin * 100.0 / order_price).ceil() / 10.0;

    DerivedOrder {
        order_price,
        side,
        is_market,
        size,
    }
}

/// One fill event reported by the exchange client (§4.4.3 inputs).
#[derive(Debug, Clone)]
pub struct FillEvent {
    pub exchange_id: String,
    pub cumulative_filled: f64,
    pub avg_price: f64,
    pub side: Side,
    pub fill_time: i64,
}

/// Everything the engine emitted while processing one fill (§9 design
/// note: output alphabet, not inline side effects).
#[derive(Debug, Default)]
pub struct FillOutcome {
    pub events: Vec<LifecycleEvent>,
    pub per_execution_reports: Vec<PerExecutionReport>,
    pub closure_reports: Vec<TradeClosureReport>,
}

/// Why an order submission was not dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Submitted(Order),
    DroppedBelowMinimum,
    Rejected(SizingError),
}

pub struct LifecycleEngine {
    active_orders: VecDeque<Order>,
    cancellation_queue: VecDeque<u32>,
    known_orders: Arc<DashMap<String, u32>>,
    current_trade: Option<Trade>,
    next_trade: Option<Trade>,
    balance: AtomicU64,
    maxdd: AtomicU64,
    connected: AtomicBool,
}

impl Default for LifecycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self {
            active_orders: VecDeque::new(),
            cancellation_queue: VecDeque::new(),
            known_orders: Arc::new(DashMap::new()),
            current_trade: None,
            next_trade: None,
            balance: AtomicU64::new(0f64.to_bits()),
            maxdd: AtomicU64::new(0f64.to_bits()),
            connected: AtomicBool::new(false),
        }
    }

    pub fn balance(&self) -> f64 {
        f64::from_bits(self.balance.load(Ordering::Relaxed))
    }

    pub fn set_balance(&self, balance: f64) {
        self.balance.store(balance.to_bits(), Ordering::Relaxed);
    }

    pub fn maxdd(&self) -> f64 {
        f64::from_bits(self.maxdd.load(Ordering::Relaxed))
    }

    /// Record a new unrealised-PnL ratio sample. `maxdd` only moves when
    /// the new value is strictly more negative (§4.4.4).
    pub fn observe_unrealised_pnl_ratio(&self, ratio: f64) {
        let mut current = f64::from_bits(self.maxdd.load(Ordering::Relaxed));
        while ratio < current {
            match self.maxdd.compare_exchange_weak(
                current.to_bits(),
                ratio.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = f64::from_bits(observed),
            }
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn active_order_count(&self) -> usize {
        self.active_orders.len()
    }

    pub fn current_trade(&self) -> Option<&Trade> {
        self.current_trade.as_ref()
    }

    /// Sum of intended + filled volume already committed on `side`,
    /// across both active orders and the open trade, used by the sizing
    /// policy's exposure check (§4.4.2).
    fn existing_exposure(&self, side: Side) -> f64 {
        let active: f64 = self
            .active_orders
            .iter()
            .filter(|o| o.side == side)
            .map(|o| o.intended_volume)
            .sum();
        let trade: f64 = self
            .current_trade
            .as_ref()
            .map(|t| match side {
                Side::Buy => t.buy_qty,
                Side::Sell => t.sell_qty,
            })
            .unwrap_or(0.0);
        active + trade
    }

    /// Process one decoded action frame (§4.4.1).
    pub fn submit_action(&mut self, action: &ActionFrame, mid_price: f64) -> SubmissionOutcome {
        let derived = derive_order(action, self.balance());

        if derived.size < MIN_CONTRACT {
            return SubmissionOutcome::DroppedBelowMinimum;
        }

        let existing = self.existing_exposure(derived.side);
        let sized = match sizing::evaluate(derived.size, existing, self.balance(), mid_price) {
            Ok(size) => size,
            Err(err) => return SubmissionOutcome::Rejected(err),
        };

        let order = Order::new_pending(action.state_id as u32, derived.side, sized, derived.order_price);
        self.active_orders.push_back(order.clone());
        self.enforce_active_order_cap();

        SubmissionOutcome::Submitted(order)
    }

    /// On exchange-assigned id response, transition `pending -> live` and
    /// record the `(exchange_id, local_id)` mapping (§4.4.1 step 5).
    pub fn acknowledge_order(&mut self, local_id: u32, exchange_id: String) {
        if let Some(order) = self.active_orders.iter_mut().find(|o| o.local_id == local_id) {
            order.acknowledge(exchange_id.clone());
            self.known_orders.insert(exchange_id, local_id);
        }
    }

    /// If the active deque exceeds the cap, queue the oldest live
    /// un-filled order for cancellation (§4.4.1 step 6).
    fn enforce_active_order_cap(&mut self) {
        if self.active_orders.len() <= MAX_ACTIVE_ORDERS {
            return;
        }
        if let Some(pos) = self
            .active_orders
            .iter()
            .position(|o| o.state == OrderState::Live)
        {
            let victim = self.active_orders.remove(pos).unwrap();
            self.cancellation_queue.push_back(victim.local_id);
        }
    }

    /// Positive cancel confirmation removes the queued entry (§4.4.5).
    pub fn confirm_cancellation(&mut self, local_id: u32) {
        self.cancellation_queue.retain(|&id| id != local_id);
    }

    fn find_order_by_exchange_id(&mut self, exchange_id: &str) -> Option<&mut Order> {
        self.active_orders
            .iter_mut()
            .find(|o| o.exchange_id.as_deref() == Some(exchange_id))
    }

    /// Core fill-processing algorithm (§4.4.3).
    pub fn process_fill(&mut self, fill: FillEvent) -> FillOutcome {
        let mut outcome = FillOutcome::default();

        let local_id = match self.known_orders.get(&fill.exchange_id) {
            Some(id) => *id,
            None => {
                tracing::warn!(exchange_id = %fill.exchange_id, "ignoring fill for unknown exchange id");
                return outcome;
            }
        };

        // Step 1: late fill of a cancellation-queued order re-enters the
        // active deque, re-inserted in fill-time order (§4.4.3 step 1).
        if !self.active_orders.iter().any(|o| o.local_id == local_id) {
            self.cancellation_queue.retain(|&id| id != local_id);
            let mut restored = Order::new_pending(local_id, fill.side, 0.0, fill.avg_price);
            restored.exchange_id = Some(fill.exchange_id.clone());
            let insert_at = self
                .active_orders
                .iter()
                .position(|o| o.fill_time > fill.fill_time)
                .unwrap_or(self.active_orders.len());
            self.active_orders.insert(insert_at, restored);
        }

        let prior_cumulative = self
            .find_order_by_exchange_id(&fill.exchange_id)
            .map(|o| o.cumulative_filled)
            .unwrap_or(0.0);
        let delta = fill.cumulative_filled - prior_cumulative;
        if delta <= FILL_EPSILON {
            return outcome;
        }

        let prior_net_abs = self.current_trade.as_ref().map(|t| t.net_size.abs()).unwrap_or(0.0);
        let state = match &self.current_trade {
            None => TradeState::Flat,
            Some(t) => TradeState::InTrade(t.direction),
        };
        let decomposition = decompose(state, fill.side, delta, prior_net_abs);

        match decomposition.transition {
            Transition::Opened => {
                let direction = Direction::from_side(fill.side);
                let mut trade = Trade::new(fill.exchange_id.clone(), direction, 0.0);
                trade.record_fill(fill.side, delta, fill.avg_price);
                let portion = FillPortion {
                    trade_id: trade.trade_id.clone(),
                    size: delta,
                    price: fill.avg_price,
                    timestamp: fill.fill_time,
                    is_closing: false,
                    execution_fraction: self.execution_fraction_for(local_id, fill.cumulative_filled),
                };
                outcome.events.push(LifecycleEvent::TradeOpened {
                    trade_id: trade.trade_id.clone(),
                    direction,
                });
                self.attach_fill_to_order(local_id, &fill, portion.clone(), fill.cumulative_filled);
                self.current_trade = Some(trade);
                self.snapshot_into_trade(TradeTarget::Current, local_id);
                self.emit_per_execution(&mut outcome, local_id, fill.exchange_id.clone(), portion.execution_fraction);
            }
            Transition::Extended => {
                let portion = FillPortion {
                    trade_id: self
                        .current_trade
                        .as_ref()
                        .map(|t| t.trade_id.clone())
                        .unwrap_or_default(),
                    size: delta,
                    price: fill.avg_price,
                    timestamp: fill.fill_time,
                    is_closing: false,
                    execution_fraction: self.execution_fraction_for(local_id, fill.cumulative_filled),
                };
                self.attach_fill_to_order(local_id, &fill, portion.clone(), fill.cumulative_filled);
                if let Some(trade) = self.current_trade.as_mut() {
                    trade.record_fill(fill.side, delta, fill.avg_price);
                }
                self.snapshot_into_trade(TradeTarget::Current, local_id);
                self.emit_per_execution(&mut outcome, local_id, fill.exchange_id.clone(), portion.execution_fraction);

                if self.current_trade.as_ref().map(|t| t.is_closed()).unwrap_or(false) {
                    self.run_closure(&mut outcome);
                }
            }
            Transition::Flipping => {
                let trade_id = self
                    .current_trade
                    .as_ref()
                    .map(|t| t.trade_id.clone())
                    .unwrap_or_default();
                let closing_fraction = self.execution_fraction_for(local_id, prior_cumulative + decomposition.closing);
                let closing_portion = FillPortion {
                    trade_id: trade_id.clone(),
                    size: decomposition.closing,
                    price: fill.avg_price,
                    timestamp: fill.fill_time,
                    is_closing: true,
                    execution_fraction: closing_fraction,
                };
                self.attach_fill_to_order(
                    local_id,
                    &fill,
                    closing_portion.clone(),
                    prior_cumulative + decomposition.closing,
                );
                if let Some(trade) = self.current_trade.as_mut() {
                    trade.record_fill(fill.side, decomposition.closing, fill.avg_price);
                }
                self.snapshot_into_trade(TradeTarget::Current, local_id);
                outcome.events.push(LifecycleEvent::FillRecorded {
                    trade_id: trade_id.clone(),
                    state_id: None,
                    is_closing: true,
                    size: decomposition.closing,
                    execution_fraction: closing_fraction,
                });
                self.emit_per_execution(&mut outcome, local_id, fill.exchange_id.clone(), closing_fraction);

                if decomposition.opening >= MIN_OPENING_SIZE {
                    let direction = Direction::from_side(fill.side);
                    let mut follow_on = Trade::new(fill.exchange_id.clone(), direction, 0.0);
                    follow_on.record_fill(fill.side, decomposition.opening, fill.avg_price);
                    let opening_fraction = self.execution_fraction_for(local_id, fill.cumulative_filled);
                    let opening_portion = FillPortion {
                        trade_id: follow_on.trade_id.clone(),
                        size: decomposition.opening,
                        price: fill.avg_price,
                        timestamp: fill.fill_time,
                        is_closing: false,
                        execution_fraction: opening_fraction,
                    };
                    self.attach_fill_to_order(local_id, &fill, opening_portion, fill.cumulative_filled);
                    outcome.events.push(LifecycleEvent::FollowOnQueued {
                        trade_id: follow_on.trade_id.clone(),
                        direction,
                        size: decomposition.opening,
                    });
                    self.next_trade = Some(follow_on);
                    self.snapshot_into_trade(TradeTarget::Next, local_id);
                    self.emit_per_execution(&mut outcome, local_id, fill.exchange_id.clone(), opening_fraction);
                }

                if self.current_trade.as_ref().map(|t| t.is_closed()).unwrap_or(false) {
                    self.run_closure(&mut outcome);
                }
            }
        }

        self.housekeep_active_orders(local_id);
        outcome
    }

    fn execution_fraction_for(&self, local_id: u32, cumulative_filled: f64) -> f64 {
        self.active_orders
            .iter()
            .find(|o| o.local_id == local_id)
            .map(|o| (cumulative_filled / o.intended_volume).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    /// Fold the current state of order `local_id` into `trade.orders`
    /// (§3.7). An order can contribute fill portions to two trades across
    /// a flipping fill, and an order can leave the active deque once
    /// terminal (§4.4.3 step 5) — so each trade keeps its own snapshot
    /// rather than reaching back into the active deque at closure time.
    fn snapshot_into_trade(&mut self, target: TradeTarget, local_id: u32) {
        let order = match self.active_orders.iter().find(|o| o.local_id == local_id) {
            Some(order) => order.clone(),
            None => return,
        };
        let trade = match target {
            TradeTarget::Current => self.current_trade.as_mut(),
            TradeTarget::Next => self.next_trade.as_mut(),
        };
        if let Some(trade) = trade {
            match trade.orders.iter_mut().find(|o| o.local_id == local_id) {
                Some(existing) => *existing = order,
                None => trade.orders.push(order),
            }
        }
    }

    fn attach_fill_to_order(&mut self, local_id: u32, fill: &FillEvent, portion: FillPortion, new_cumulative: f64) {
        if let Some(order) = self.active_orders.iter_mut().find(|o| o.local_id == local_id) {
            order.trade_id = portion.trade_id.clone();
            order.apply_fill(portion, new_cumulative);
        } else {
            tracing::warn!(exchange_id = %fill.exchange_id, "fill recognized but order missing from active deque");
        }
    }

    /// Publish one per-execution report for this fill delta. Every
    /// distinct, epsilon-significant fill delta gets its own report
    /// (§8 scenario 4: a partial-fill progression emits one report per
    /// delta on the same `state_id`); the at-most-once guarantee (§3.8)
    /// instead governs redelivery of the identical broker message at the
    /// consumption boundary, not repeat calls here for new deltas.
    fn emit_per_execution(&mut self, outcome: &mut FillOutcome, local_id: u32, exchange_id: String, fraction: f64) {
        if let Some(order) = self.active_orders.iter().find(|o| o.local_id == local_id) {
            outcome
                .per_execution_reports
                .push(PerExecutionReport::new(order.local_id, exchange_id, fraction));
        }
    }

    /// Closure path (§4.4.3 step 4): compute reward, emit the closure
    /// report, then either activate the queued follow-on trade or reset
    /// to flat.
    fn run_closure(&mut self, outcome: &mut FillOutcome) {
        let trade = match self.current_trade.take() {
            Some(t) => t,
            None => return,
        };
        let reward = trade.compute_reward(self.maxdd().abs()).unwrap_or(0.0);

        // Built from the trade's own order snapshots, not the active
        // deque: an order can carry fill portions from more than one
        // trade (the flipping case), and can have already left the
        // active deque once terminal (§4.4.3 step 5).
        let mut filled_portions: Vec<HashMap<String, f64>> = Vec::new();
        for order in &trade.orders {
            if let Some(exchange_id) = &order.exchange_id {
                for portion in &order.fill_portions {
                    if portion.trade_id == trade.trade_id {
                        let mut entry = HashMap::new();
                        entry.insert(exchange_id.clone(), portion.execution_fraction * 100.0);
                        filled_portions.push(entry);
                    }
                }
            }
        }

        outcome.events.push(LifecycleEvent::TradeClosed {
            trade_id: trade.trade_id.clone(),
            reward,
        });
        outcome
            .closure_reports
            .push(TradeClosureReport::new(filled_portions, reward));

        self.current_trade = self.next_trade.take();
    }

    /// Step 5: move fully filled orders out of the active deque; if still
    /// over the cap, cancel the oldest live un-filled order (§4.4.3).
    fn housekeep_active_orders(&mut self, local_id: u32) {
        if let Some(pos) = self.active_orders.iter().position(|o| o.local_id == local_id) {
            if self.active_orders[pos].is_terminal() {
                let order = self.active_orders.remove(pos).unwrap();
                if let Some(exchange_id) = order.exchange_id {
                    self.known_orders.insert(exchange_id, order.local_id);
                }
            }
        }
        self.enforce_active_order_cap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(engine: &mut LifecycleEngine, local_id: u32, exchange_id: &str, side: Side, volume: f64, price: f64) {
        let mut order = Order::new_pending(local_id, side, volume, price);
        order.acknowledge(exchange_id.to_string());
        engine.active_orders.push_back(order);
        engine.known_orders.insert(exchange_id.to_string(), local_id);
    }

    #[test]
    fn scenario_one_buy_then_sell_full_round_trip() {
        let mut engine = LifecycleEngine::new();
        ack(&mut engine, 1, "buy-1", Side::Buy, 1.0, 30000.0);
        let out1 = engine.process_fill(FillEvent {
            exchange_id: "buy-1".into(),
            cumulative_filled: 1.0,
            avg_price: 30000.0,
            side: Side::Buy,
            fill_time: 1,
        });
        assert_eq!(out1.per_execution_reports.len(), 1);
        assert!(out1.closure_reports.is_empty());

        ack(&mut engine, 2, "sell-1", Side::Sell, 1.0, 30300.0);
        let out2 = engine.process_fill(FillEvent {
            exchange_id: "sell-1".into(),
            cumulative_filled: 1.0,
            avg_price: 30300.0,
            side: Side::Sell,
            fill_time: 2,
        });
        assert_eq!(out2.closure_reports.len(), 1);
        assert!((out2.closure_reports[0].reward - 100.0).abs() < 1e-6);
    }

    #[test]
    fn scenario_three_flip_queues_follow_on_with_fifty_reward() {
        let mut engine = LifecycleEngine::new();
        ack(&mut engine, 1, "buy-1", Side::Buy, 1.0, 30000.0);
        engine.process_fill(FillEvent {
            exchange_id: "buy-1".into(),
            cumulative_filled: 1.0,
            avg_price: 30000.0,
            side: Side::Buy,
            fill_time: 1,
        });

        ack(&mut engine, 2, "sell-big", Side::Sell, 3.0, 30150.0);
        let out = engine.process_fill(FillEvent {
            exchange_id: "sell-big".into(),
            cumulative_filled: 3.0,
            avg_price: 30150.0,
            side: Side::Sell,
            fill_time: 2,
        });

        assert_eq!(out.closure_reports.len(), 1);
        assert!((out.closure_reports[0].reward - 50.0).abs() < 1e-6);
        assert!(out
            .events
            .iter()
            .any(|e| matches!(e, LifecycleEvent::FollowOnQueued { direction: Direction::Short, .. })));
        let follow_on = engine.current_trade().expect("follow-on trade active");
        assert_eq!(follow_on.direction, Direction::Short);
        assert!((follow_on.net_size + 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_exchange_id_is_a_no_op() {
        let mut engine = LifecycleEngine::new();
        let out = engine.process_fill(FillEvent {
            exchange_id: "ghost".into(),
            cumulative_filled: 1.0,
            avg_price: 30000.0,
            side: Side::Buy,
            fill_time: 1,
        });
        assert!(out.events.is_empty());
        assert!(out.per_execution_reports.is_empty());
        assert!(engine.current_trade().is_none());
    }

    #[test]
    fn partial_fill_progression_never_regresses_execution_fraction() {
        let mut engine = LifecycleEngine::new();
        ack(&mut engine, 1, "buy-1", Side::Buy, 1.0, 30000.0);

        let deltas = [(0.3, 30000.0), (0.8, 30005.0), (1.0, 30010.0)];
        let mut last_fraction = 0.0;
        for (cumulative, price) in deltas {
            let out = engine.process_fill(FillEvent {
                exchange_id: "buy-1".into(),
                cumulative_filled: cumulative,
                avg_price: price,
                side: Side::Buy,
                fill_time: 1,
            });
            assert_eq!(out.per_execution_reports.len(), 1);
            let fraction = out.per_execution_reports[0].execution_percentage.unwrap();
            assert!(fraction >= last_fraction);
            last_fraction = fraction;
        }
    }
}
