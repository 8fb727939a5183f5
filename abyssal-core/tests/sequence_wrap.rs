//! Scenario 6 (§8): after sequence id 65535 the next feature frame uses 0,
//! and the Decision Relay still produces a correct 80-frame window when
//! the 80 newest frames straddle that wrap.

use abyssal_core::book::depth::DepthFeatures;
use abyssal_core::frame::{ActionKind, FeatureFrame};
use abyssal_core::relay::{Decision, DecisionFunction, DecisionRelay, TradeOutcome, TrainingHook};
use std::sync::{Arc, Mutex};

fn frame(seq: u16) -> FeatureFrame {
    FeatureFrame {
        bids: vec![],
        asks: vec![],
        mid_price: 100.0,
        features: [DepthFeatures::default(); 5],
        sequence_id: seq,
    }
}

/// Records the window of sequence ids it was asked to decide over.
struct CapturingDecision {
    captured: Arc<Mutex<Vec<u16>>>,
}

impl DecisionFunction for CapturingDecision {
    fn decide(&mut self, window: &[FeatureFrame]) -> Decision {
        *self.captured.lock().unwrap() = window.iter().map(|f| f.sequence_id).collect();
        Decision {
            action_kind: ActionKind::Limit,
            price_offset: 0.0,
            volume_fraction: 0.01,
        }
    }
}

struct NoopHook;
impl TrainingHook for NoopHook {
    fn observe(&mut self, _trade: TradeOutcome) {}
}

#[test]
fn window_spanning_the_wraparound_is_built_in_emission_order() {
    // 80 consecutive sequence ids ending just past the u16 wraparound:
    // 65500..=65535, then 0..=43.
    let ids: Vec<u16> = (65500u32..=65535)
        .chain(0u32..=43)
        .map(|v| v as u16)
        .collect();
    assert_eq!(ids.len(), 80);
    assert_eq!(*ids.last().unwrap(), 43);

    let captured = Arc::new(Mutex::new(Vec::new()));
    let mut relay = DecisionRelay::new(
        CapturingDecision {
            captured: captured.clone(),
        },
        NoopHook,
    );

    let mut action = None;
    for &seq in &ids {
        action = relay.on_feature_frame(frame(seq));
    }

    // 43 is odd, so the parity gate should have suppressed the decision on
    // the very frame that completed the window.
    assert!(action.is_none());

    // One more frame (44, even) completes an 80-window ending past the
    // wrap and must fire, with the window built in emission order rather
    // than numeric order.
    let action = relay.on_feature_frame(frame(44)).unwrap();
    assert_eq!(action.state_id, 44);

    let window_ids = captured.lock().unwrap().clone();
    let expected: Vec<u16> = (65501u32..=65535)
        .chain(0u32..=44)
        .map(|v| v as u16)
        .collect();
    assert_eq!(window_ids.len(), 80);
    assert_eq!(window_ids, expected);
}
