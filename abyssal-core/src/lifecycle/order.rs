//! Order and fill-portion records (§3.5, §3.6).

/// Which side of the book an order or fill sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Live,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

/// One exchange-reported fill delta, decomposed into the part that closed
/// prior exposure and the part that opened new exposure (§3.6).
#[derive(Debug, Clone, PartialEq)]
pub struct FillPortion {
    pub trade_id: String,
    pub size: f64,
    pub price: f64,
    pub timestamp: i64,
    pub is_closing: bool,
    pub execution_fraction: f64,
}

/// An order submitted to the exchange by the Lifecycle Engine (§3.5).
#[derive(Debug, Clone)]
pub struct Order {
    pub local_id: u32,
    pub exchange_id: Option<String>,
    pub side: Side,
    pub intended_volume: f64,
    pub intended_price: f64,
    pub cumulative_filled: f64,
    pub avg_fill_price: f64,
    pub state: OrderState,
    pub trade_id: String,
    pub fill_portions: Vec<FillPortion>,
    pub fill_time: i64,
}

impl Order {
    pub fn new_pending(local_id: u32, side: Side, intended_volume: f64, intended_price: f64) -> Self {
        Self {
            local_id,
            exchange_id: None,
            side,
            intended_volume,
            intended_price,
            cumulative_filled: 0.0,
            avg_fill_price: 0.0,
            state: OrderState::Pending,
            trade_id: String::new(),
            fill_portions: Vec::new(),
            fill_time: 0,
        }
    }

    pub fn acknowledge(&mut self, exchange_id: String) {
        self.exchange_id = Some(exchange_id);
        self.state = OrderState::Live;
    }

    /// Fold one fill portion into the order, updating `cumulative_filled`,
    /// `avg_fill_price` (volume-weighted) and the terminal/partial state.
    pub fn apply_fill(&mut self, portion: FillPortion, new_cumulative: f64) {
        let prior_notional = self.avg_fill_price * self.cumulative_filled;
        let added_notional = portion.price * portion.size;
        self.cumulative_filled = new_cumulative;
        if self.cumulative_filled > 0.0 {
            self.avg_fill_price = (prior_notional + added_notional) / self.cumulative_filled;
        }
        self.fill_time = portion.timestamp;
        self.fill_portions.push(portion);

        self.state = if self.cumulative_filled + 1e-8 >= self.intended_volume {
            OrderState::Filled
        } else {
            OrderState::PartiallyFilled
        };
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            OrderState::Filled | OrderState::Canceled | OrderState::Rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_then_full_fill_updates_avg_price() {
        let mut order = Order::new_pending(1, Side::Buy, 1.0, 30000.0);
        order.acknowledge("ex-1".into());
        order.apply_fill(
            FillPortion {
                trade_id: "t1".into(),
                size: 0.3,
                price: 30000.0,
                timestamp: 1,
                is_closing: false,
                execution_fraction: 0.3,
            },
            0.3,
        );
        assert_eq!(order.state, OrderState::PartiallyFilled);
        order.apply_fill(
            FillPortion {
                trade_id: "t1".into(),
                size: 0.7,
                price: 30010.0,
                timestamp: 2,
                is_closing: false,
                execution_fraction: 1.0,
            },
            1.0,
        );
        assert_eq!(order.state, OrderState::Filled);
        let expected_avg = (30000.0 * 0.3 + 30010.0 * 0.7) / 1.0;
        assert!((order.avg_fill_price - expected_avg).abs() < 1e-9);
    }
}
