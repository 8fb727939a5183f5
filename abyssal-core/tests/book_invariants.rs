//! Cross-step book invariants (§3.2, §3.8, §8): after any sequence of
//! snapshot + N deltas that each conserve the 400-level count, both sides
//! stay strictly sorted with no zero-volume rows.

use abyssal_core::book::{OrderBook, LEVELS_PER_SIDE};
use proptest::prelude::*;

fn full_side(start: f64, step: f64, ascending: bool) -> Vec<(f64, f64, f64)> {
    (0..LEVELS_PER_SIDE)
        .map(|i| {
            let price = if ascending {
                start + i as f64 * step
            } else {
                start - i as f64 * step
            };
            (price, 1.0 + i as f64 * 0.01, 1.0)
        })
        .collect()
}

fn assert_invariants(book: &OrderBook) {
    assert_eq!(book.bids.len(), LEVELS_PER_SIDE);
    assert_eq!(book.asks.len(), LEVELS_PER_SIDE);
    assert!(book
        .bids
        .levels()
        .windows(2)
        .all(|w| w[0].price > w[1].price));
    assert!(book
        .asks
        .levels()
        .windows(2)
        .all(|w| w[0].price < w[1].price));
    assert!(book.bids.levels().iter().all(|l| l.volume > 0.0));
    assert!(book.asks.levels().iter().all(|l| l.volume > 0.0));
}

proptest! {
    /// A sequence of in-place volume overwrites never changes the level
    /// count, so every one of them must succeed and leave both sides
    /// exactly 400 levels deep, strictly sorted, with no zero-volume row.
    #[test]
    fn overwrite_only_deltas_preserve_invariants(
        overwrites in prop::collection::vec((0usize..LEVELS_PER_SIDE, 0.01f64..500.0, 1.0f64..50.0), 0..100),
    ) {
        let mut book = OrderBook::new();
        book.apply_snapshot(&full_side(100.0, 0.01, false), &full_side(100.02, 0.01, true)).unwrap();
        assert_invariants(&book);

        for (idx, volume, order_count) in overwrites {
            let bid_price = book.bids.levels()[idx].price;
            let ask_price = book.asks.levels()[idx].price;
            book.apply_update(&[(bid_price, volume, order_count)], &[(ask_price, volume, order_count)]).unwrap();
            assert_invariants(&book);
        }
    }

    /// Swapping one bid level for a brand-new price (remove + insert in
    /// the same update) also conserves the count and must succeed.
    #[test]
    fn replace_one_level_preserves_invariants(removed_idx in 0usize..LEVELS_PER_SIDE) {
        let mut book = OrderBook::new();
        book.apply_snapshot(&full_side(100.0, 0.01, false), &full_side(100.02, 0.01, true)).unwrap();

        let removed_price = book.bids.levels()[removed_idx].price;
        let new_price = book.bids.levels()[LEVELS_PER_SIDE - 1].price - 1.0;
        book.apply_update(&[(removed_price, 0.0, 0.0), (new_price, 3.0, 2.0)], &[]).unwrap();
        assert_invariants(&book);
        assert!(book.bids.levels().iter().all(|l| l.price != removed_price));
        assert!(book.bids.levels().iter().any(|l| l.price == new_price));
    }
}
