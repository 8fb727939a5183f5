//! Fill-accounting properties and literal end-to-end scenarios (§8) that
//! exercise the public `LifecycleEngine` surface rather than its private
//! fields, plus a property test over the pure `decompose` classifier.

use abyssal_core::frame::{ActionFrame, ActionKind};
use abyssal_core::lifecycle::fsm::{decompose, TradeState, Transition};
use abyssal_core::lifecycle::order::Side;
use abyssal_core::lifecycle::trade::Direction;
use abyssal_core::lifecycle::LifecycleEngine;
use abyssal_core::lifecycle::{FillEvent, SubmissionOutcome};
use proptest::prelude::*;

fn submit_and_ack(
    engine: &mut LifecycleEngine,
    state_id: u16,
    side: Side,
    exchange_id: &str,
) -> u32 {
    let price_offset = if side == Side::Buy { -0.5 } else { 0.5 };
    let action = ActionFrame {
        action_kind: ActionKind::Limit,
        price_offset,
        volume_fraction: 0.01,
        mid_price_cents: 4_000_000,
        state_id,
    };
    let outcome = engine.submit_action(&action, 40000.0);
    let order = match outcome {
        SubmissionOutcome::Submitted(order) => order,
        other => panic!("expected submission to succeed, got {other:?}"),
    };
    engine.acknowledge_order(order.local_id, exchange_id.to_string());
    order.local_id
}

/// Scenario 2 (§8): flat -> sell 2.0 @ 40000 -> buy 2.0 @ 39600. Direction
/// is short; base reward = ((40000 - 39600) / 39600) * 10000.
#[test]
fn scenario_short_round_trip_computes_expected_reward() {
    let mut engine = LifecycleEngine::new();
    engine.set_balance(1_000_000.0);

    submit_and_ack(&mut engine, 1, Side::Sell, "sell-1");
    let out1 = engine.process_fill(FillEvent {
        exchange_id: "sell-1".into(),
        cumulative_filled: 2.0,
        avg_price: 40000.0,
        side: Side::Sell,
        fill_time: 1,
    });
    assert_eq!(out1.per_execution_reports.len(), 1);
    assert!(out1.closure_reports.is_empty());
    assert_eq!(engine.current_trade().unwrap().direction, Direction::Short);

    submit_and_ack(&mut engine, 2, Side::Buy, "buy-1");
    let out2 = engine.process_fill(FillEvent {
        exchange_id: "buy-1".into(),
        cumulative_filled: 2.0,
        avg_price: 39600.0,
        side: Side::Buy,
        fill_time: 2,
    });

    assert_eq!(out2.closure_reports.len(), 1);
    let expected_reward = ((40000.0 - 39600.0) / 39600.0) * 10000.0;
    assert!((out2.closure_reports[0].reward - expected_reward).abs() < 1e-6);
    assert!(engine.current_trade().is_none());
}

/// Unknown exchange ids must not mutate any engine state (§8 scenario 5).
#[test]
fn unknown_fill_leaves_active_order_count_untouched() {
    let mut engine = LifecycleEngine::new();
    engine.set_balance(1_000_000.0);
    submit_and_ack(&mut engine, 1, Side::Buy, "buy-1");
    let before = engine.active_order_count();

    engine.process_fill(FillEvent {
        exchange_id: "ghost".into(),
        cumulative_filled: 1.0,
        avg_price: 30000.0,
        side: Side::Buy,
        fill_time: 99,
    });

    assert_eq!(engine.active_order_count(), before);
}

proptest! {
    /// Property (§8): for any fill delta against any prior trade state,
    /// closing + opening = delta, closing <= |prior_net|, opening >= 0.
    #[test]
    fn decomposition_conserves_delta(
        delta in 0.0001f64..10_000.0,
        prior_net_abs in 0.0f64..10_000.0,
        flat in any::<bool>(),
        same_direction in any::<bool>(),
    ) {
        let state = if flat {
            TradeState::Flat
        } else if same_direction {
            TradeState::InTrade(Direction::Long)
        } else {
            TradeState::InTrade(Direction::Short)
        };
        let fill_side = if same_direction { Side::Buy } else { Side::Sell };

        let d = decompose(state, fill_side, delta, prior_net_abs);
        prop_assert!((d.closing + d.opening - delta).abs() < 1e-9);
        prop_assert!(d.opening >= 0.0);
        if matches!(d.transition, Transition::Flipping) {
            prop_assert!(d.closing <= prior_net_abs + 1e-9);
        }
    }
}
