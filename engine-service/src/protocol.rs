//! JSON wire envelope for client requests and server responses.
//!
//! Requests are tagged by `type` and then `action`
//! (`{"type":"order","action":"add",...}`); responses carry a single
//! `type` tag. Wire prices are decimal numbers; everything behind this
//! module works in integer ticks, so prices are snapped to the
//! 4-decimal tick grid here and nowhere else.

use orderbook::{BookSnapshot, Side, Trade};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ticks per currency unit: 4 decimal places of price precision.
pub const TICK_SCALE: f64 = 10_000.0;

pub const MAX_SYMBOL_LEN: usize = 15;
pub const MIN_PRICE: f64 = 0.0001;
pub const MAX_PRICE: f64 = 1_000_000.0;
pub const MIN_QUANTITY: u64 = 1;
pub const MAX_QUANTITY: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("invalid symbol: must be 1-{MAX_SYMBOL_LEN} uppercase letters, got {0:?}")]
    InvalidSymbol(String),
    #[error("price out of range [{MIN_PRICE}, {MAX_PRICE}]: {0}")]
    InvalidPrice(f64),
    #[error("quantity out of range [{MIN_QUANTITY}, {MAX_QUANTITY}]: {0}")]
    InvalidQuantity(u64),
}

/// A decoded client frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientRequest {
    Order(OrderAction),
    Book(BookAction),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum OrderAction {
    Add { symbol: String, order: OrderBody },
    Cancel { order_id: u64 },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum BookAction {
    /// Empty symbol means every registered book.
    Query { symbol: String },
}

/// Order fields as submitted by the client. The `id` is accepted for
/// wire compatibility but ignored; the engine assigns its own.
#[derive(Debug, Deserialize)]
pub struct OrderBody {
    #[serde(default)]
    pub id: u64,
    pub price: f64,
    pub quantity: u64,
    pub is_buy: bool,
}

/// Outbound frames: request responses and trade broadcasts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "order_response")]
    OrderResponse {
        success: bool,
        order_id: u64,
        message: String,
    },
    #[serde(rename = "cancel_response")]
    CancelResponse {
        success: bool,
        order_id: u64,
        message: String,
    },
    #[serde(rename = "book_response")]
    BookResponse { symbols: Vec<SymbolBook> },
    #[serde(rename = "trade")]
    Trade(TradeBroadcast),
}

/// One symbol's book in a `book_response`, both sides walked in
/// ascending price order.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolBook {
    pub symbol: String,
    pub buy_orders: Vec<LevelEntry>,
    pub sell_orders: Vec<LevelEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelEntry {
    pub price: f64,
    pub orders: Vec<OrderEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEntry {
    pub id: u64,
    /// Remaining (unfilled) quantity.
    pub quantity: u64,
    pub is_buy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeBroadcast {
    pub trade_id: u64,
    pub symbol: String,
    pub price: f64,
    pub quantity: u64,
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub timestamp: u64,
}

impl From<&Trade> for TradeBroadcast {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id,
            symbol: trade.symbol.clone(),
            price: ticks_to_price(trade.px_ticks),
            quantity: trade.qty,
            buy_order_id: trade.buy_order_id.0,
            sell_order_id: trade.sell_order_id.0,
            timestamp: trade.ts_ms,
        }
    }
}

impl SymbolBook {
    pub fn from_snapshot(snapshot: &BookSnapshot) -> Self {
        fn levels(side: &[orderbook::LevelSnapshot]) -> Vec<LevelEntry> {
            side.iter()
                .map(|level| LevelEntry {
                    price: ticks_to_price(level.px_ticks),
                    orders: level
                        .orders
                        .iter()
                        .map(|o| OrderEntry {
                            id: o.id.0,
                            quantity: o.remaining,
                            is_buy: matches!(o.side, Side::Buy),
                        })
                        .collect(),
                })
                .collect()
        }

        Self {
            symbol: snapshot.symbol.clone(),
            buy_orders: levels(&snapshot.bids),
            sell_orders: levels(&snapshot.asks),
        }
    }
}

pub fn parse_request(text: &str) -> Result<ClientRequest, ProtocolError> {
    serde_json::from_str(text).map_err(|err| ProtocolError::Malformed(err.to_string()))
}

/// Snaps a wire price to the tick grid, rejecting values outside the
/// allowed range.
pub fn price_to_ticks(price: f64) -> Result<i64, ProtocolError> {
    if !price.is_finite() || price < MIN_PRICE || price > MAX_PRICE {
        return Err(ProtocolError::InvalidPrice(price));
    }
    Ok((price * TICK_SCALE).round() as i64)
}

pub fn ticks_to_price(ticks: i64) -> f64 {
    ticks as f64 / TICK_SCALE
}

pub fn validate_symbol(symbol: &str) -> Result<(), ProtocolError> {
    let ok = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol.bytes().all(|b| b.is_ascii_uppercase());
    if ok {
        Ok(())
    } else {
        Err(ProtocolError::InvalidSymbol(symbol.to_string()))
    }
}

pub fn validate_quantity(quantity: u64) -> Result<(), ProtocolError> {
    if (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidQuantity(quantity))
    }
}
