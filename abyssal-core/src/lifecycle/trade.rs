//! Trade aggregation and reward computation (§3.7, §4.4.4).

use super::order::{Order, Side};

const NET_SIZE_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_side(side: Side) -> Self {
        match side {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

/// A trade in progress: one or more orders whose fill portions are being
/// accumulated into a signed net position (§3.7).
#[derive(Debug, Clone)]
pub struct Trade {
    pub trade_id: String,
    pub direction: Direction,
    pub net_size: f64,
    pub orders: Vec<Order>,
    pub buy_qp: f64,
    pub buy_qty: f64,
    pub sell_qp: f64,
    pub sell_qty: f64,
    pub cumulative_reward: f64,
    pub reduced_qty: f64,
}

impl Trade {
    pub fn new(trade_id: String, direction: Direction, net_size: f64) -> Self {
        Self {
            trade_id,
            direction,
            net_size,
            orders: Vec::new(),
            buy_qp: 0.0,
            buy_qty: 0.0,
            sell_qp: 0.0,
            sell_qty: 0.0,
            cumulative_reward: 0.0,
            reduced_qty: 0.0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.net_size.abs() < NET_SIZE_EPSILON
    }

    /// Fold one fill into the side-wise running sums used for VWAP, and
    /// recompute `net_size` from the accumulated buy/sell quantities
    /// (§3.7, §4.4.3).
    pub fn record_fill(&mut self, side: Side, size: f64, price: f64) {
        match side {
            Side::Buy => {
                self.buy_qp += price * size;
                self.buy_qty += size;
            }
            Side::Sell => {
                self.sell_qp += price * size;
                self.sell_qty += size;
            }
        }
        self.net_size = self.buy_qty - self.sell_qty;
    }

    pub fn avg_buy(&self) -> Option<f64> {
        (self.buy_qty > 0.0).then(|| self.buy_qp / self.buy_qty)
    }

    pub fn avg_sell(&self) -> Option<f64> {
        (self.sell_qty > 0.0).then(|| self.sell_qp / self.sell_qty)
    }

    /// Reward at closure (§4.4.4). `dd` is `|maxdd|`, the magnitude of the
    /// most negative unrealised-PnL ratio observed during the trade.
    pub fn compute_reward(&self, dd: f64) -> Option<f64> {
        let avg_buy = self.avg_buy()?;
        let avg_sell = self.avg_sell()?;

        // Both directions share the same base formula: selling higher than
        // bought (long) or buying back lower than sold (short) is a gain,
        // scaled against the average entry/exit price used as cost basis
        // (§4.4.4, reconciled against §8 scenario 2).
        let base = ((avg_sell - avg_buy) / avg_buy) * 10_000.0;

        Some(if base > 0.0 {
            base * (1.0 - 2.0 * dd)
        } else if base < 0.0 {
            base * (1.0 + 2.0 * dd)
        } else {
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_round_trip_reward_matches_scenario_one() {
        let mut trade = Trade::new("t1".into(), Direction::Long, 1.0);
        trade.record_fill(Side::Buy, 1.0, 30000.0);
        trade.record_fill(Side::Sell, 1.0, 30300.0);
        assert!(trade.is_closed());
        let reward = trade.compute_reward(0.0).unwrap();
        assert!((reward - 100.0).abs() < 1e-9);
    }

    #[test]
    fn short_round_trip_reward_matches_scenario_two() {
        let mut trade = Trade::new("t2".into(), Direction::Short, -2.0);
        trade.record_fill(Side::Sell, 2.0, 40000.0);
        trade.record_fill(Side::Buy, 2.0, 39600.0);
        assert!(trade.is_closed());
        let reward = trade.compute_reward(0.0).unwrap();
        assert!((reward - 101.0101).abs() < 1e-3);
    }

    #[test]
    fn drawdown_dampens_positive_reward() {
        let mut trade = Trade::new("t3".into(), Direction::Long, 1.0);
        trade.record_fill(Side::Buy, 1.0, 30000.0);
        trade.record_fill(Side::Sell, 1.0, 30300.0);
        let reward = trade.compute_reward(0.1).unwrap();
        assert!((reward - 80.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_dampens_negative_reward_toward_zero_magnitude_growth() {
        let mut trade = Trade::new("t4".into(), Direction::Long, 1.0);
        trade.record_fill(Side::Buy, 1.0, 30300.0);
        trade.record_fill(Side::Sell, 1.0, 30000.0);
        let reward = trade.compute_reward(0.1).unwrap();
        // base < 0 uses (1 + 2*dd), growing the magnitude of the penalty.
        assert!(reward < 0.0);
    }
}
