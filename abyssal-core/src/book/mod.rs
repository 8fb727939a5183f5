//! Dense, fixed-width order book (§3.1–3.2, §4.1).
//!
//! `OrderBook` maintains exactly [`LEVELS_PER_SIDE`] levels per side after
//! every successfully applied snapshot or delta. It owns no threading model
//! of its own — the depth-ingest thread in §5 is expected to hold the only
//! `&mut OrderBook` in existence at any time.

pub mod depth;

use crate::errors::BookError;
use std::collections::VecDeque;
use std::fmt;

/// Levels retained per side. Violating this after an update is a fatal
/// state error for the current session (§3.2).
pub const LEVELS_PER_SIDE: usize = 400;

/// How many past side snapshots to retain (§4.1 rule 3). Not consumed by
/// the current feature set but kept for the extensibility hook the spec
/// calls out — a future change-feature would diff against this history.
pub const HISTORY_DEPTH: usize = 10;

/// Which side of the book a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// A single price level: `(price, volume, order_count)` (§3.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub volume: f64,
    pub order_count: f64,
}

impl BookLevel {
    pub fn new(price: f64, volume: f64, order_count: f64) -> Self {
        Self {
            price,
            volume,
            order_count,
        }
    }
}

/// One side of the book: bids descending, asks ascending, strictly
/// monotone in price, no duplicate levels, no zero-volume entries (§3.8).
#[derive(Debug, Clone, Default)]
pub struct OrderBookSide {
    side: Option<BookSide>,
    levels: Vec<BookLevel>,
}

impl OrderBookSide {
    fn new(side: BookSide) -> Self {
        Self {
            side: Some(side),
            levels: Vec::with_capacity(LEVELS_PER_SIDE),
        }
    }

    pub fn levels(&self) -> &[BookLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn best(&self) -> Option<&BookLevel> {
        self.levels.first()
    }

    /// Locate `price` by binary search using this side's ordering.
    /// `Ok(idx)` if present, `Err(idx)` with the insertion point otherwise.
    fn locate(&self, price: f64) -> Result<usize, usize> {
        match self.side.expect("side initialized before use") {
            BookSide::Bid => self
                .levels
                .binary_search_by(|lvl| price.partial_cmp(&lvl.price).unwrap_or(std::cmp::Ordering::Equal)),
            BookSide::Ask => self
                .levels
                .binary_search_by(|lvl| lvl.price.partial_cmp(&price).unwrap_or(std::cmp::Ordering::Equal)),
        }
    }

    fn is_sorted_strict(&self) -> bool {
        match self.side.expect("side initialized before use") {
            BookSide::Bid => self.levels.windows(2).all(|w| w[0].price > w[1].price),
            BookSide::Ask => self.levels.windows(2).all(|w| w[0].price < w[1].price),
        }
    }

    /// Replace the whole side from a snapshot frame (§4.1 rule 1).
    /// Discards non-positive-volume levels, sorts per side ordering, and
    /// validates the 400-level invariant.
    fn apply_snapshot(&mut self, raw: &[(f64, f64, f64)]) -> Result<(), BookError> {
        let side = self.side.expect("side initialized before use");
        let mut levels: Vec<BookLevel> = raw
            .iter()
            .filter(|(_, volume, _)| *volume > 0.0)
            .map(|(price, volume, order_count)| BookLevel::new(*price, *volume, *order_count))
            .collect();

        match side {
            BookSide::Bid => levels.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap()),
            BookSide::Ask => levels.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap()),
        }

        self.levels = levels;
        if !self.is_sorted_strict() {
            return Err(BookError::MalformedFrame(
                "snapshot contains duplicate price levels".into(),
            ));
        }
        self.validate_count()
    }

    /// Apply every level change in one depth-feed update message, then
    /// re-assert the 400-level invariant once for the whole batch (§4.1
    /// rule 2 — an update message typically evicts and admits levels in
    /// the same batch, so the invariant is only meaningful after all of
    /// its level changes have landed).
    fn apply_delta_frame(&mut self, raw: &[(f64, f64, f64)]) -> Result<(), BookError> {
        for (price, volume, order_count) in raw {
            match self.locate(*price) {
                Ok(idx) => {
                    if *volume <= 0.0 {
                        self.levels.remove(idx);
                    } else {
                        self.levels[idx].volume = *volume;
                        self.levels[idx].order_count = *order_count;
                    }
                }
                Err(idx) => {
                    if *volume > 0.0 {
                        self.levels.insert(idx, BookLevel::new(*price, *volume, *order_count));
                    }
                    // volume <= 0 for an unknown price: nothing to remove.
                }
            }
        }
        self.validate_count()
    }

    fn validate_count(&self) -> Result<(), BookError> {
        if self.levels.len() != LEVELS_PER_SIDE {
            return Err(BookError::LevelCountViolation {
                side: match self.side.expect("side initialized before use") {
                    BookSide::Bid => "bid",
                    BookSide::Ask => "ask",
                },
                expected: LEVELS_PER_SIDE,
                actual: self.levels.len(),
            });
        }
        Ok(())
    }

    /// Sum of volume across the best `depth` levels.
    pub fn sum_volume(&self, depth: usize) -> f64 {
        self.levels.iter().take(depth).map(|l| l.volume).sum()
    }

    /// Sum of order count across the best `depth` levels.
    pub fn sum_order_count(&self, depth: usize) -> f64 {
        self.levels.iter().take(depth).map(|l| l.order_count).sum()
    }

    /// Volume-weighted average price across the best `depth` levels. Zero
    /// if there is no volume in that window (§4.1 rule 4).
    pub fn vwap(&self, depth: usize) -> f64 {
        let mut notional = 0.0;
        let mut volume = 0.0;
        for level in self.levels.iter().take(depth) {
            notional += level.price * level.volume;
            volume += level.volume;
        }
        if volume > 0.0 {
            notional / volume
        } else {
            0.0
        }
    }
}

/// A snapshot of one side's levels, retained in the rolling history buffer.
#[derive(Debug, Clone)]
pub struct SideHistoryEntry {
    pub levels: Vec<BookLevel>,
}

/// The book for a single instrument: both sides plus a rolling history of
/// past side snapshots (§3.2, §4.1 rule 3).
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub bids: OrderBookSide,
    pub asks: OrderBookSide,
    initialized: bool,
    bid_history: VecDeque<SideHistoryEntry>,
    ask_history: VecDeque<SideHistoryEntry>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: OrderBookSide::new(BookSide::Bid),
            asks: OrderBookSide::new(BookSide::Ask),
            initialized: false,
            bid_history: VecDeque::with_capacity(HISTORY_DEPTH),
            ask_history: VecDeque::with_capacity(HISTORY_DEPTH),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Apply a `snapshot` frame: clear both sides, repopulate, validate.
    pub fn apply_snapshot(
        &mut self,
        bids: &[(f64, f64, f64)],
        asks: &[(f64, f64, f64)],
    ) -> Result<(), BookError> {
        self.bids.apply_snapshot(bids)?;
        self.asks.apply_snapshot(asks)?;
        self.initialized = true;
        self.push_history();
        Ok(())
    }

    /// Apply an `update` frame. A missing snapshot is a fatal error
    /// (§4.1 rule 2); the session must reconnect and re-snapshot.
    pub fn apply_update(
        &mut self,
        bids: &[(f64, f64, f64)],
        asks: &[(f64, f64, f64)],
    ) -> Result<(), BookError> {
        if !self.initialized {
            return Err(BookError::MissingSnapshot);
        }
        if !bids.is_empty() {
            self.bids.apply_delta_frame(bids)?;
        }
        if !asks.is_empty() {
            self.asks.apply_delta_frame(asks)?;
        }
        self.push_history();
        Ok(())
    }

    fn push_history(&mut self) {
        if self.bid_history.len() == HISTORY_DEPTH {
            self.bid_history.pop_front();
        }
        if self.ask_history.len() == HISTORY_DEPTH {
            self.ask_history.pop_front();
        }
        self.bid_history.push_back(SideHistoryEntry {
            levels: self.bids.levels.clone(),
        });
        self.ask_history.push_back(SideHistoryEntry {
            levels: self.asks.levels.clone(),
        });
    }

    pub fn bid_history(&self) -> &VecDeque<SideHistoryEntry> {
        &self.bid_history
    }

    pub fn ask_history(&self) -> &VecDeque<SideHistoryEntry> {
        &self.ask_history
    }

    pub fn best_bid(&self) -> f64 {
        self.bids.best().map(|l| l.price).unwrap_or(0.0)
    }

    pub fn best_ask(&self) -> f64 {
        self.asks.best().map(|l| l.price).unwrap_or(0.0)
    }

    /// Mid price: mean of best bid and best ask, or 0 if either side is
    /// empty (§3.3).
    pub fn mid_price(&self) -> f64 {
        let bid = self.best_bid();
        let ask = self.best_ask();
        if bid == 0.0 || ask == 0.0 {
            0.0
        } else {
            (bid + ask) / 2.0
        }
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OrderBook(bids={}, asks={}, mid={:.2})",
            self.bids.len(),
            self.asks.len(),
            self.mid_price()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_side(base: f64, step: f64, ascending: bool) -> Vec<(f64, f64, f64)> {
        (0..LEVELS_PER_SIDE)
            .map(|i| {
                let offset = i as f64 * step;
                let price = if ascending { base + offset } else { base - offset };
                (price, 1.0, 1.0)
            })
            .collect()
    }

    fn seeded_book() -> OrderBook {
        let mut book = OrderBook::new();
        let bids = full_side(100.0, 0.01, false);
        let asks = full_side(100.01, 0.01, true);
        book.apply_snapshot(&bids, &asks).unwrap();
        book
    }

    #[test]
    fn snapshot_enforces_level_count() {
        let mut book = OrderBook::new();
        let bids = vec![(100.0, 1.0, 1.0)];
        let asks = full_side(100.01, 0.01, true);
        assert!(book.apply_snapshot(&bids, &asks).is_err());
    }

    #[test]
    fn snapshot_drops_zero_volume_levels() {
        let mut raw = full_side(100.0, 0.01, false);
        raw.push((50.0, 0.0, 0.0));
        let mut book = OrderBook::new();
        let asks = full_side(100.01, 0.01, true);
        book.apply_snapshot(&raw, &asks).unwrap();
        assert_eq!(book.bids.len(), LEVELS_PER_SIDE);
    }

    #[test]
    fn update_before_snapshot_is_fatal() {
        let mut book = OrderBook::new();
        let err = book.apply_update(&[(100.0, 1.0, 1.0)], &[]).unwrap_err();
        assert_eq!(err, BookError::MissingSnapshot);
    }

    #[test]
    fn delta_removes_known_level_only() {
        let mut book = seeded_book();
        let removed_price = book.bids.levels()[5].price;
        let new_price = book.bids.levels()[LEVELS_PER_SIDE - 1].price - 0.01;
        let deltas = vec![(removed_price, 0.0, 0.0), (new_price, 2.0, 3.0)];
        book.apply_update(&deltas, &[]).unwrap();
        assert_eq!(book.bids.len(), LEVELS_PER_SIDE);
        assert!(book.bids.levels().iter().all(|l| l.price != removed_price));
        assert!(book.bids.levels().iter().any(|l| l.price == new_price));
    }

    #[test]
    fn delta_overwrites_existing_level() {
        let mut book = seeded_book();
        let price = book.asks.levels()[3].price;
        book.apply_update(&[], &[(price, 9.0, 4.0)]).unwrap();
        let lvl = book.asks.levels().iter().find(|l| l.price == price).unwrap();
        assert_eq!(lvl.volume, 9.0);
        assert_eq!(lvl.order_count, 4.0);
    }

    #[test]
    fn delta_that_unbalances_count_is_rejected() {
        let mut book = seeded_book();
        let removed_price = book.bids.levels()[5].price;
        let err = book.apply_update(&[(removed_price, 0.0, 0.0)], &[]).unwrap_err();
        assert!(matches!(err, BookError::LevelCountViolation { .. }));
    }

    #[test]
    fn mid_price_is_zero_when_either_side_empty() {
        let book = OrderBook::new();
        assert_eq!(book.mid_price(), 0.0);
    }

    #[test]
    fn vwap_is_zero_on_empty_window() {
        let side = OrderBookSide::new(BookSide::Bid);
        assert_eq!(side.vwap(10), 0.0);
    }
}
