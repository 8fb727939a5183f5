//! Orderbook Snapshot Printer
//!
//! Simple CLI tool to print the dense 400-level order book state to the
//! terminal. Useful for eyeballing what the Depth Engine (`abyssal_core`)
//! would publish without standing up a broker or an exchange connection.
//!
//! ## Usage
//!
//! ```bash
//! # Print top 5 levels
//! print-orderbook
//!
//! # Print top 10 levels
//! print-orderbook --levels 10
//!
//! # JSON output
//! print-orderbook --format json
//! ```

use abyssal_core::book::depth::compute_features;
use abyssal_core::book::{OrderBook, LEVELS_PER_SIDE};
use anyhow::Result;
use clap::Parser;
use serde_json::json;

#[derive(Parser)]
#[command(name = "print-orderbook")]
#[command(about = "Print a mock order book snapshot", long_about = None)]
struct Args {
    /// Number of levels to display per side.
    #[arg(short, long, default_value = "5")]
    levels: usize,

    /// Output format (pretty, compact, json).
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let book = mock_book();

    match args.format.as_str() {
        "json" => print_json(&book, args.levels),
        "compact" => print_compact(&book, args.levels),
        _ => print_pretty(&book, args.levels),
    }

    Ok(())
}

/// A full 400-level-per-side book centered on $50,000, built in memory
/// (the upstream depth feed is an external collaborator out of scope for
/// this crate). Exercises the same snapshot path the Depth Engine uses.
fn mock_book() -> OrderBook {
    let mut book = OrderBook::new();
    let bids: Vec<_> = (0..LEVELS_PER_SIDE)
        .map(|i| {
            let price = 50_000.0 - i as f64 * 0.5;
            let volume = 0.5 + (i as f64 * 0.123) % 3.0;
            let orders = 1.0 + (i % 5) as f64;
            (price, volume, orders)
        })
        .collect();
    let asks: Vec<_> = (0..LEVELS_PER_SIDE)
        .map(|i| {
            let price = 50_001.0 + i as f64 * 0.5;
            let volume = 0.8 + (i as f64 * 0.087) % 3.0;
            let orders = 1.0 + (i % 5) as f64;
            (price, volume, orders)
        })
        .collect();
    book.apply_snapshot(&bids, &asks).expect("mock snapshot satisfies the 400-level invariant");
    book
}

fn spread_bps(book: &OrderBook) -> f64 {
    let mid = book.mid_price();
    if mid == 0.0 {
        return 0.0;
    }
    (book.best_ask() - book.best_bid()) / mid * 10_000.0
}

fn imbalance_pct(book: &OrderBook) -> f64 {
    compute_features(book)[0].volume_imbalance * 100.0
}

fn create_ascii_bar(size: f64, max_size: f64, width: usize) -> String {
    if max_size <= 0.0 {
        return " ".repeat(width);
    }
    let filled = ((size / max_size) * width as f64) as usize;
    let filled = filled.min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

fn imbalance_description(imbalance: f64) -> &'static str {
    match imbalance {
        i if i > 30.0 => "(Strong buy pressure)",
        i if i > 10.0 => "(Buy pressure)",
        i if i < -30.0 => "(Strong sell pressure)",
        i if i < -10.0 => "(Sell pressure)",
        _ => "(Balanced)",
    }
}

fn print_pretty(book: &OrderBook, max_levels: usize) {
    let mid = book.mid_price();
    let spread = spread_bps(book);
    let imbalance = imbalance_pct(book);

    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║          BTC/USD ORDERBOOK (mock snapshot)               ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!(
        "║  Depth: {}x{} levels                                  ║",
        book.bids.len(),
        book.asks.len()
    );
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    println!("         ASKS        SIZE       BAR");
    println!("    ════════════════════════════════════════");
    let ask_levels = book.asks.levels();
    let max_size = ask_levels.iter().take(max_levels).map(|l| l.volume).fold(0.0, f64::max);

    for level in ask_levels.iter().take(max_levels).rev() {
        let bar = create_ascii_bar(level.volume, max_size, 15);
        println!("    {:>10.2}   {:>6.3}  {}", level.price, level.volume, bar);
    }

    println!();
    println!("    ─────────────────────────────────────────");
    println!("     MID: ${:.2}  │  Spread: {:.1}bps", mid, spread);
    println!("    ─────────────────────────────────────────");
    println!();

    println!("         BIDS        SIZE       BAR");
    println!("    ════════════════════════════════════════");
    let bid_levels = book.bids.levels();

    for level in bid_levels.iter().take(max_levels) {
        let bar = create_ascii_bar(level.volume, max_size, 15);
        println!("    {:>10.2}   {:>6.3}  {}", level.price, level.volume, bar);
    }

    println!();
    println!("Imbalance: {:+.1}% {}", imbalance, imbalance_description(imbalance));
    println!();
}

fn print_compact(book: &OrderBook, max_levels: usize) {
    let mid = book.mid_price();
    let spread = spread_bps(book);

    println!(
        "BTC/USD  Mid: ${:.2}  Spread: {:.1}bps  Depth: {}x{}",
        mid,
        spread,
        book.bids.len(),
        book.asks.len()
    );

    for level in book.asks.levels().iter().take(max_levels).rev() {
        println!("ASK  {:>10.2}  {:>6.3}", level.price, level.volume);
    }
    println!("MID  {:>10.2}", mid);
    for level in book.bids.levels().iter().take(max_levels) {
        println!("BID  {:>10.2}  {:>6.3}", level.price, level.volume);
    }
}

fn print_json(book: &OrderBook, max_levels: usize) {
    let bid_levels: Vec<_> = book
        .bids
        .levels()
        .iter()
        .take(max_levels)
        .map(|l| json!({ "price": l.price, "size": l.volume, "orders": l.order_count }))
        .collect();

    let ask_levels: Vec<_> = book
        .asks
        .levels()
        .iter()
        .take(max_levels)
        .map(|l| json!({ "price": l.price, "size": l.volume, "orders": l.order_count }))
        .collect();

    let output = json!({
        "mid_price": book.mid_price(),
        "spread_bps": spread_bps(book),
        "imbalance_pct": imbalance_pct(book),
        "bids": bid_levels,
        "asks": ask_levels,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}
