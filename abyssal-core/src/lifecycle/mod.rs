//! Lifecycle Engine (§2, §4.4): order submission, position-sizing policy,
//! fill decomposition, trade aggregation and reward computation.

pub mod engine;
pub mod fsm;
pub mod order;
pub mod reports;
pub mod sizing;
pub mod trade;

pub use engine::{
    DerivedOrder, FillEvent, FillOutcome, LifecycleEngine, SubmissionOutcome,
};
pub use fsm::{FillDecomposition, LifecycleEvent, TradeState, Transition};
pub use order::{FillPortion, Order, OrderState, Side};
pub use reports::{PerExecutionReport, PublishedIdGuard, TradeClosureReport};
pub use trade::{Direction, Trade};
