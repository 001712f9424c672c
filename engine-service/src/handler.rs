//! Request dispatch: turns decoded client frames into registry and book
//! operations, and shapes exactly one response per request.
//!
//! No I/O happens here; the WebSocket layer owns the transport and this
//! module owns the semantics, so the codec and the transport can change
//! independently.

use crate::engine::{Engine, EngineError};
use crate::protocol::{
    self, BookAction, ClientRequest, OrderAction, OrderBody, ServerMessage, SymbolBook,
};
use orderbook::{AdmitOutcome, CancelOutcome, NewOrder, OrderId, Side};
use tracing::{debug, warn};

/// Decodes and dispatches one inbound text frame.
///
/// Malformed frames still get a response: an unsuccessful
/// `order_response` explaining the decode failure, so every request sees
/// exactly one reply.
pub async fn handle_text(engine: &Engine, text: &str) -> ServerMessage {
    match protocol::parse_request(text) {
        Ok(request) => handle_request(engine, request).await,
        Err(err) => {
            warn!("rejecting malformed frame: {err}");
            ServerMessage::OrderResponse {
                success: false,
                order_id: 0,
                message: err.to_string(),
            }
        }
    }
}

pub async fn handle_request(engine: &Engine, request: ClientRequest) -> ServerMessage {
    match request {
        ClientRequest::Order(OrderAction::Add { symbol, order }) => {
            add_order(engine, symbol, order).await
        }
        ClientRequest::Order(OrderAction::Cancel { order_id }) => {
            cancel_order(engine, order_id).await
        }
        ClientRequest::Book(BookAction::Query { symbol }) => query_books(engine, &symbol).await,
    }
}

/// All-books snapshot, pushed to every session when it connects.
pub async fn full_snapshot(engine: &Engine) -> ServerMessage {
    query_books(engine, "").await
}

async fn add_order(engine: &Engine, symbol: String, body: OrderBody) -> ServerMessage {
    // Boundary validation; the book re-checks its own invariants on admit.
    if let Err(err) = protocol::validate_symbol(&symbol) {
        return order_reject(err.to_string());
    }
    if let Err(err) = protocol::validate_quantity(body.quantity) {
        return order_reject(err.to_string());
    }
    let px_ticks = match protocol::price_to_ticks(body.price) {
        Ok(ticks) => ticks,
        Err(err) => return order_reject(err.to_string()),
    };

    let book = match engine.get_or_create(&symbol) {
        Ok(book) => book,
        Err(EngineError::CapacityExceeded) => return order_reject("symbol capacity".to_string()),
    };

    let side = if body.is_buy { Side::Buy } else { Side::Sell };
    let outcome = book.write().await.admit(NewOrder {
        symbol,
        side,
        px_ticks,
        qty: body.quantity,
    });

    match outcome {
        AdmitOutcome::Accepted { order_id } => ServerMessage::OrderResponse {
            success: true,
            order_id: order_id.0,
            message: "Order accepted".to_string(),
        },
        AdmitOutcome::AcceptedAndMatched { order_id, trades } => ServerMessage::OrderResponse {
            success: true,
            order_id: order_id.0,
            message: format!("Order accepted, {} trade(s) executed", trades.len()),
        },
        AdmitOutcome::Rejected { reason } => order_reject(reason.to_string()),
    }
}

fn order_reject(message: String) -> ServerMessage {
    ServerMessage::OrderResponse {
        success: false,
        order_id: 0,
        message,
    }
}

// The cancel frame carries no symbol, so the order is looked for in every
// book; ids are engine-unique, so at most one book can hold it.
async fn cancel_order(engine: &Engine, order_id: u64) -> ServerMessage {
    let id = OrderId(order_id);
    for (symbol, book) in engine.all_books() {
        if let CancelOutcome::Cancelled { .. } = book.write().await.cancel(id) {
            debug!("cancelled order {order_id} in {symbol}");
            return ServerMessage::CancelResponse {
                success: true,
                order_id,
                message: "Order cancelled".to_string(),
            };
        }
    }

    ServerMessage::CancelResponse {
        success: false,
        order_id,
        message: "Order not found".to_string(),
    }
}

// Empty symbol renders every book. Unknown symbols (and an engine with no
// books at all) produce an empty `symbols` array rather than an error.
async fn query_books(engine: &Engine, symbol: &str) -> ServerMessage {
    let mut symbols = Vec::new();

    if symbol.is_empty() {
        for (_, book) in engine.all_books() {
            let snapshot = book.read().await.snapshot();
            symbols.push(SymbolBook::from_snapshot(&snapshot));
        }
    } else if let Some(book) = engine.get(symbol) {
        let snapshot = book.read().await.snapshot();
        symbols.push(SymbolBook::from_snapshot(&snapshot));
    }

    ServerMessage::BookResponse { symbols }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MAX_SYMBOLS;

    async fn add(engine: &Engine, symbol: &str, price: f64, qty: u64, is_buy: bool) -> (bool, u64) {
        let frame = format!(
            r#"{{"type":"order","action":"add","symbol":"{symbol}",
                "order":{{"id":0,"price":{price},"quantity":{qty},"is_buy":{is_buy}}}}}"#
        );
        match handle_text(engine, &frame).await {
            ServerMessage::OrderResponse {
                success, order_id, ..
            } => (success, order_id),
            other => panic!("expected order_response, got {other:?}"),
        }
    }

    async fn cancel(engine: &Engine, order_id: u64) -> bool {
        let frame = format!(r#"{{"type":"order","action":"cancel","order_id":{order_id}}}"#);
        match handle_text(engine, &frame).await {
            ServerMessage::CancelResponse { success, .. } => success,
            other => panic!("expected cancel_response, got {other:?}"),
        }
    }

    async fn query(engine: &Engine, symbol: &str) -> Vec<SymbolBook> {
        let frame = format!(r#"{{"type":"book","action":"query","symbol":"{symbol}"}}"#);
        match handle_text(engine, &frame).await {
            ServerMessage::BookResponse { symbols } => symbols,
            other => panic!("expected book_response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn crossing_match_at_equal_price() {
        let engine = Engine::new();
        let mut trades = engine.subscribe_trades();

        let (ok, buy_id) = add(&engine, "AAPL", 150.0, 100, true).await;
        assert!(ok);
        let (ok, sell_id) = add(&engine, "AAPL", 150.0, 100, false).await;
        assert!(ok);

        let trade = trades.try_recv().expect("one trade");
        assert_eq!(trade.buy_order_id.0, buy_id);
        assert_eq!(trade.sell_order_id.0, sell_id);
        assert_eq!(trade.qty, 100);
        assert_eq!(protocol::ticks_to_price(trade.px_ticks), 150.0);
        assert!(trades.try_recv().is_err());

        let books = query(&engine, "AAPL").await;
        assert!(books[0].buy_orders.is_empty());
        assert!(books[0].sell_orders.is_empty());
    }

    #[tokio::test]
    async fn partial_fill_remainder_rests() {
        let engine = Engine::new();
        let (_, buy_id) = add(&engine, "AAPL", 150.0, 100, true).await;
        add(&engine, "AAPL", 150.0, 60, false).await;

        let books = query(&engine, "AAPL").await;
        let bids = &books[0].buy_orders;
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].price, 150.0);
        assert_eq!(bids[0].orders.len(), 1);
        assert_eq!(bids[0].orders[0].id, buy_id);
        assert_eq!(bids[0].orders[0].quantity, 40);
        assert!(books[0].sell_orders.is_empty());
    }

    #[tokio::test]
    async fn price_priority_across_levels() {
        let engine = Engine::new();
        let mut trades = engine.subscribe_trades();
        add(&engine, "AAPL", 151.0, 100, false).await;
        let (_, mid_id) = add(&engine, "AAPL", 150.5, 100, false).await;
        let (_, best_id) = add(&engine, "AAPL", 150.0, 100, false).await;

        let (_, taker_id) = add(&engine, "AAPL", 151.0, 100, true).await;

        let trade = trades.try_recv().expect("one trade");
        assert_eq!(trade.buy_order_id.0, taker_id);
        assert_eq!(trade.sell_order_id.0, best_id);
        assert_eq!(protocol::ticks_to_price(trade.px_ticks), 150.0);
        assert!(trades.try_recv().is_err());

        // The remaining best ask is the mid level.
        let books = query(&engine, "AAPL").await;
        let asks = &books[0].sell_orders;
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].price, 150.5);
        assert_eq!(asks[0].orders[0].id, mid_id);
    }

    #[tokio::test]
    async fn time_priority_within_level() {
        let engine = Engine::new();
        let mut trades = engine.subscribe_trades();
        let (_, first_id) = add(&engine, "AAPL", 150.0, 100, true).await;
        let (_, second_id) = add(&engine, "AAPL", 150.0, 100, true).await;

        add(&engine, "AAPL", 150.0, 100, false).await;

        let trade = trades.try_recv().expect("one trade");
        assert_eq!(trade.buy_order_id.0, first_id);

        let books = query(&engine, "AAPL").await;
        let bids = &books[0].buy_orders;
        assert_eq!(bids[0].orders.len(), 1);
        assert_eq!(bids[0].orders[0].id, second_id);
        assert_eq!(bids[0].orders[0].quantity, 100);
    }

    #[tokio::test]
    async fn cancel_before_fill_prevents_trade() {
        let engine = Engine::new();
        let mut trades = engine.subscribe_trades();
        let (_, buy_id) = add(&engine, "AAPL", 150.0, 100, true).await;

        assert!(cancel(&engine, buy_id).await);
        add(&engine, "AAPL", 150.0, 100, false).await;

        assert!(trades.try_recv().is_err(), "no trade may execute");
        let books = query(&engine, "AAPL").await;
        assert!(books[0].buy_orders.is_empty());
        assert_eq!(books[0].sell_orders[0].orders[0].quantity, 100);
    }

    #[tokio::test]
    async fn multi_level_sweep_emits_trades_in_order() {
        let engine = Engine::new();
        let mut trades = engine.subscribe_trades();
        let (_, low_id) = add(&engine, "AAPL", 150.0, 40, false).await;
        let (_, high_id) = add(&engine, "AAPL", 150.5, 60, false).await;

        let (ok, _) = add(&engine, "AAPL", 151.0, 100, true).await;
        assert!(ok);

        let first = trades.try_recv().expect("first trade");
        assert_eq!(first.sell_order_id.0, low_id);
        assert_eq!((protocol::ticks_to_price(first.px_ticks), first.qty), (150.0, 40));
        let second = trades.try_recv().expect("second trade");
        assert_eq!(second.sell_order_id.0, high_id);
        assert_eq!(
            (protocol::ticks_to_price(second.px_ticks), second.qty),
            (150.5, 60)
        );

        let books = query(&engine, "AAPL").await;
        assert!(books[0].buy_orders.is_empty());
        assert!(books[0].sell_orders.is_empty());
    }

    #[tokio::test]
    async fn cancel_finds_orders_in_any_book() {
        let engine = Engine::new();
        add(&engine, "AAPL", 150.0, 10, true).await;
        let (_, msft_id) = add(&engine, "MSFT", 400.0, 10, true).await;

        assert!(cancel(&engine, msft_id).await);
        assert!(!cancel(&engine, msft_id).await, "second cancel misses");
        assert!(!cancel(&engine, 9999).await);
    }

    #[tokio::test]
    async fn rejects_carry_reasons() {
        let engine = Engine::new();

        let frame = r#"{"type":"order","action":"add","symbol":"aapl",
            "order":{"id":0,"price":150.0,"quantity":100,"is_buy":true}}"#;
        match handle_text(&engine, frame).await {
            ServerMessage::OrderResponse {
                success, message, ..
            } => {
                assert!(!success);
                assert!(message.contains("symbol"));
            }
            other => panic!("expected order_response, got {other:?}"),
        }

        let (ok, _) = add(&engine, "AAPL", 0.00001, 100, true).await;
        assert!(!ok);
        let (ok, _) = add(&engine, "AAPL", 150.0, 0, true).await;
        assert!(!ok);
        let (ok, _) = add(&engine, "AAPL", 150.0, 2_000_000, true).await;
        assert!(!ok);

        // No book was created along the way: invalid orders never touch
        // the registry.
        assert_eq!(engine.book_count(), 0);
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_response() {
        let engine = Engine::new();
        match handle_text(&engine, "{ not json").await {
            ServerMessage::OrderResponse {
                success, message, ..
            } => {
                assert!(!success);
                assert!(message.contains("malformed"));
            }
            other => panic!("expected order_response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_of_empty_engine_returns_empty_symbols() {
        let engine = Engine::new();
        assert!(query(&engine, "").await.is_empty());
        assert!(query(&engine, "AAPL").await.is_empty());
    }

    #[tokio::test]
    async fn query_all_returns_every_book_sorted() {
        let engine = Engine::new();
        add(&engine, "MSFT", 400.0, 10, true).await;
        add(&engine, "AAPL", 150.0, 10, true).await;

        let books = query(&engine, "").await;
        let names: Vec<&str> = books.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn capacity_overflow_is_reported() {
        let engine = Engine::new();
        for i in 0..MAX_SYMBOLS {
            let a = (b'A' + (i / 26) as u8) as char;
            let b = (b'A' + (i % 26) as u8) as char;
            let (ok, _) = add(&engine, &format!("{a}{b}"), 1.0, 1, true).await;
            assert!(ok);
        }

        let frame = r#"{"type":"order","action":"add","symbol":"ZZZZ",
            "order":{"id":0,"price":1.0,"quantity":1,"is_buy":true}}"#;
        match handle_text(&engine, frame).await {
            ServerMessage::OrderResponse {
                success, message, ..
            } => {
                assert!(!success);
                assert_eq!(message, "symbol capacity");
            }
            other => panic!("expected order_response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_supplied_order_ids_are_ignored() {
        let engine = Engine::new();
        let frame = r#"{"type":"order","action":"add","symbol":"AAPL",
            "order":{"id":777,"price":150.0,"quantity":10,"is_buy":true}}"#;
        match handle_text(&engine, frame).await {
            ServerMessage::OrderResponse {
                success, order_id, ..
            } => {
                assert!(success);
                assert_ne!(order_id, 777);
            }
            other => panic!("expected order_response, got {other:?}"),
        }
    }
}
