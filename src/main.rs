//! Matching-core performance lab.
//!
//! Runs latency and throughput measurements against the orderbook crate,
//! then a short demo showing admission, matching and trade notification.

use orderbook::{NewOrder, OrderBook, Side, Trade, TradeSink};
use std::sync::Arc;


fn main() {
    println!("=== tickmatch performance lab ===");

    latency_test::run_latency_tests();
    latency_test::run_throughput_test();

    println!("\n=== demo ===");
    run_demo();
}

/// Demonstrates a spread, a crossing order and the trade sink firing.
fn run_demo() {
    let mut book = OrderBook::new("AAPL");
    let sink: TradeSink = Arc::new(|trade: &Trade| {
        println!(
            "  trade #{}: {} x {} ticks (buy {} / sell {})",
            trade.trade_id, trade.qty, trade.px_ticks, trade.buy_order_id, trade.sell_order_id
        );
    });
    book.set_trade_sink(sink);

    // Resting ask at 150.00, bid at 149.50: a half-point spread.
    let ask = book.admit(limit(Side::Sell, 1_500_000, 100));
    println!("ask admitted: id={:?}", ask.order_id());
    let bid = book.admit(limit(Side::Buy, 1_495_000, 50));
    println!("bid admitted: id={:?}", bid.order_id());
    println!("best bid: {:?}", book.best_bid());
    println!("best ask: {:?}", book.best_ask());

    // A crossing bid partially fills the resting ask at the ask's price.
    println!("submitting crossing bid for 75 at 150.00:");
    let crossing = book.admit(limit(Side::Buy, 1_500_000, 75));
    println!("trades executed: {}", crossing.trades().len());

    println!("final best bid: {:?}", book.best_bid());
    println!("final best ask: {:?}", book.best_ask());
    println!("live orders: {}", book.total_orders());
}

fn limit(side: Side, px_ticks: i64, qty: u64) -> NewOrder {
    NewOrder {
        symbol: "AAPL".to_string(),
        side,
        px_ticks,
        qty,
    }
}
