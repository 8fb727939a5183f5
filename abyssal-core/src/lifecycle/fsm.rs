//! Closing/opening decomposition modeled as a small state machine (§9
//! design note: "the closing/opening decomposition is the single most
//! error-prone path... model it as a small state machine with states
//! `{Flat, InTrade(dir), Flipping(...)}`... emit reports as an output
//! alphabet rather than inline side-effects").
//!
//! [`decompose`] is the pure classifier; [`LifecycleEvent`] is the output
//! alphabet the engine turns into report publications and trade mutations.

use super::order::Side;
use super::trade::Direction;

/// The trade-level state a fill is classified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Flat,
    InTrade(Direction),
}

/// What kind of transition a fill drove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No prior trade; this fill opened one.
    Opened,
    /// Same-direction fill against an existing trade.
    Extended,
    /// Opposite-direction fill; `closing` reduces the existing trade,
    /// `opening` (if any) starts a follow-on.
    Flipping,
}

/// The closing/opening split of one fill delta (§3.8, §4.4.3 step 3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillDecomposition {
    pub closing: f64,
    pub opening: f64,
    pub transition: Transition,
}

/// Minimum opening remainder that is worth starting a follow-on trade for
/// (§4.4.3).
pub const MIN_OPENING_SIZE: f64 = 1e-3;

/// Classify one fill delta against the current trade state (§3.8,
/// §4.4.3). `prior_net_abs` is `|prior_net|`, the magnitude of the
/// existing trade's net size; callers pass `0.0` when `state` is `Flat`.
pub fn decompose(state: TradeState, fill_side: Side, delta: f64, prior_net_abs: f64) -> FillDecomposition {
    match state {
        TradeState::Flat => FillDecomposition {
            closing: 0.0,
            opening: delta,
            transition: Transition::Opened,
        },
        TradeState::InTrade(direction) => {
            if Direction::from_side(fill_side) == direction {
                FillDecomposition {
                    closing: 0.0,
                    opening: delta,
                    transition: Transition::Extended,
                }
            } else {
                let closing = delta.min(prior_net_abs);
                let opening = delta - closing;
                FillDecomposition {
                    closing,
                    opening,
                    transition: Transition::Flipping,
                }
            }
        }
    }
}

/// Output alphabet for one fill-processing step (§9 design note). The
/// engine turns these into report publications and state mutations
/// rather than emitting side effects inline.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A new trade was started (flat->in-trade, or the opening remainder
    /// of a flipping fill).
    TradeOpened { trade_id: String, direction: Direction },
    /// A fill portion was recorded against the current trade; carries
    /// enough to drive a per-execution report.
    FillRecorded {
        trade_id: String,
        state_id: Option<u32>,
        is_closing: bool,
        size: f64,
        execution_fraction: f64,
    },
    /// The current trade closed; `reward` is the final computed reward.
    TradeClosed { trade_id: String, reward: f64 },
    /// A follow-on trade was queued from the opening remainder of a
    /// flipping fill.
    FollowOnQueued {
        trade_id: String,
        direction: Direction,
        size: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_state_opens_on_any_fill() {
        let d = decompose(TradeState::Flat, Side::Buy, 1.0, 0.0);
        assert_eq!(d.transition, Transition::Opened);
        assert_eq!(d.closing, 0.0);
        assert_eq!(d.opening, 1.0);
    }

    #[test]
    fn same_direction_extends_without_closing() {
        let d = decompose(TradeState::InTrade(Direction::Long), Side::Buy, 0.5, 1.0);
        assert_eq!(d.transition, Transition::Extended);
        assert_eq!(d.closing, 0.0);
        assert_eq!(d.opening, 0.5);
    }

    #[test]
    fn opposite_direction_splits_into_closing_and_opening() {
        let d = decompose(TradeState::InTrade(Direction::Long), Side::Sell, 3.0, 1.0);
        assert_eq!(d.transition, Transition::Flipping);
        assert_eq!(d.closing, 1.0);
        assert_eq!(d.opening, 2.0);
    }

    #[test]
    fn opposite_direction_fill_smaller_than_position_has_no_opening() {
        let d = decompose(TradeState::InTrade(Direction::Short), Side::Buy, 0.4, 1.0);
        assert_eq!(d.transition, Transition::Flipping);
        assert_eq!(d.closing, 0.4);
        assert_eq!(d.opening, 0.0);
    }
}
