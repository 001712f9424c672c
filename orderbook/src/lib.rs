//! Limit order book with price-time priority matching.
//!
//! Core pieces:
//! - Price-time priority matching (best price first, then FIFO arrival)
//! - Partial fills, executed at the resting order's price
//! - Eager cancellation that collapses emptied price levels
//! - Synchronous trade notification at the moment of each match
//!
//! The book is synchronous and does no I/O. Wrap it in a lock for
//! concurrent access; all prices are integer ticks.

pub mod price_tree;
pub mod types;

pub use price_tree::{PriceLevel, PriceTree};
pub use types::{
    BookSnapshot, IdSource, LevelSnapshot, NewOrder, Order, OrderId, OrderSnapshot, Side, Trade,
};

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Observer invoked synchronously for every executed match, in execution
/// order, on the thread running the matcher. Sinks must not call back
/// into the same book; buffer and defer any outbound I/O.
pub type TradeSink = Arc<dyn Fn(&Trade) + Send + Sync>;

/// Why an admission was refused. Refusals leave the book untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidPrice,
    InvalidQuantity,
    SymbolMismatch { book: String, order: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidPrice => write!(f, "price must be positive"),
            RejectReason::InvalidQuantity => write!(f, "quantity must be positive"),
            RejectReason::SymbolMismatch { book, order } => {
                write!(f, "order symbol {order} does not match book {book}")
            }
        }
    }
}

/// Result of [`OrderBook::admit`].
#[derive(Clone, Debug)]
pub enum AdmitOutcome {
    /// Rested in full; nothing on the opposite side crossed.
    Accepted { order_id: OrderId },
    /// Crossed on arrival. Any unfilled remainder rests in the book.
    AcceptedAndMatched {
        order_id: OrderId,
        trades: Vec<Trade>,
    },
    Rejected { reason: RejectReason },
}

impl AdmitOutcome {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            AdmitOutcome::Accepted { order_id }
            | AdmitOutcome::AcceptedAndMatched { order_id, .. } => Some(*order_id),
            AdmitOutcome::Rejected { .. } => None,
        }
    }

    pub fn trades(&self) -> &[Trade] {
        match self {
            AdmitOutcome::AcceptedAndMatched { trades, .. } => trades,
            _ => &[],
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, AdmitOutcome::Rejected { .. })
    }
}

/// Result of [`OrderBook::cancel`].
///
/// A fully filled order leaves no trace in the book, so cancelling it
/// reports `NotFound`; no archive of filled ids is kept.
#[derive(Clone, Debug)]
pub enum CancelOutcome {
    Cancelled { order: Order },
    NotFound,
}

/// Central limit order book for one symbol.
///
/// Matching runs on admission: an incoming order first consumes crossing
/// orders on the opposite side, then any remainder rests at its price.
/// Orders are anonymous, so an aggressor may match an order from the same
/// client, including its own earlier submissions.
pub struct OrderBook {
    symbol: String,
    bids: PriceTree,
    asks: PriceTree,
    total_orders: usize,
    next_seq: u64,
    ids: Arc<IdSource>,
    trade_sink: Option<TradeSink>,
}

impl OrderBook {
    /// Creates an empty book with its own id source. Engines that run
    /// several books should share one [`IdSource`] via [`Self::with_ids`].
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_ids(symbol, Arc::new(IdSource::new()))
    }

    pub fn with_ids(symbol: impl Into<String>, ids: Arc<IdSource>) -> Self {
        let symbol = symbol.into();
        debug!("created order book for symbol: {symbol}");
        Self {
            symbol,
            bids: PriceTree::new(Side::Buy),
            asks: PriceTree::new(Side::Sell),
            total_orders: 0,
            next_seq: 0,
            ids,
            trade_sink: None,
        }
    }

    /// Registers the observer notified for every executed match.
    pub fn set_trade_sink(&mut self, sink: TradeSink) {
        self.trade_sink = Some(sink);
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of live orders resting across both sides.
    pub fn total_orders(&self) -> usize {
        self.total_orders
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.asks.best_price()
    }

    pub fn bids(&self) -> &PriceTree {
        &self.bids
    }

    pub fn asks(&self) -> &PriceTree {
        &self.asks
    }

    /// Admits a limit order: validate, stamp identity and arrival order,
    /// match against the opposite side, rest any remainder.
    pub fn admit(&mut self, new: NewOrder) -> AdmitOutcome {
        if new.px_ticks <= 0 {
            return AdmitOutcome::Rejected {
                reason: RejectReason::InvalidPrice,
            };
        }
        if new.qty == 0 {
            return AdmitOutcome::Rejected {
                reason: RejectReason::InvalidQuantity,
            };
        }
        if new.symbol != self.symbol {
            return AdmitOutcome::Rejected {
                reason: RejectReason::SymbolMismatch {
                    book: self.symbol.clone(),
                    order: new.symbol,
                },
            };
        }

        self.next_seq += 1;
        let mut order = Order {
            id: self.ids.next_order_id(),
            symbol: new.symbol,
            side: new.side,
            px_ticks: new.px_ticks,
            qty: new.qty,
            remaining: new.qty,
            seq: self.next_seq,
        };
        debug!(
            "admitting order: id={} symbol={} side={} px_ticks={} qty={}",
            order.id, order.symbol, order.side, order.px_ticks, order.qty
        );

        let trades = self.match_incoming(&mut order);
        let order_id = order.id;

        if order.remaining > 0 {
            match order.side {
                Side::Buy => self.bids.insert(order),
                Side::Sell => self.asks.insert(order),
            }
            self.total_orders += 1;
        }

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            debug_assert!(bid < ask, "book crossed after admit: bid={bid} ask={ask}");
        }

        if trades.is_empty() {
            AdmitOutcome::Accepted { order_id }
        } else {
            AdmitOutcome::AcceptedAndMatched { order_id, trades }
        }
    }

    // The matching loop. One fill per iteration: locate the best crossing
    // level, consume its head order, drop the order when it empties and
    // the level when it drains. The trade sink fires inside the loop so
    // observers see fills in execution order.
    fn match_incoming(&mut self, taker: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        let OrderBook {
            symbol,
            bids,
            asks,
            total_orders,
            ids,
            trade_sink,
            ..
        } = self;
        let opposite = match taker.side {
            Side::Buy => asks,
            Side::Sell => bids,
        };

        while taker.remaining > 0 {
            let Some(best_px) = opposite.best_price() else {
                break;
            };
            if !taker.side.crosses(taker.px_ticks, best_px) {
                break;
            }

            let level_emptied = {
                let Some(level) = opposite.level_mut(best_px) else {
                    break;
                };
                let Some(resting) = level.front_mut() else {
                    // Levels are collapsed when they drain; a reachable
                    // empty level is an engine defect, not client input.
                    panic!("matching invariant violated: empty level {best_px} in {symbol} book");
                };

                let fill = taker.remaining.min(resting.remaining);
                let (buy_order_id, sell_order_id) = match taker.side {
                    Side::Buy => (taker.id, resting.id),
                    Side::Sell => (resting.id, taker.id),
                };
                taker.remaining -= fill;
                resting.remaining -= fill;

                let trade = Trade {
                    trade_id: ids.next_trade_id(),
                    symbol: symbol.clone(),
                    buy_order_id,
                    sell_order_id,
                    // Execution at the resting price, never the aggressor's.
                    px_ticks: best_px,
                    qty: fill,
                    ts_ms: types::now_ms(),
                };
                info!(
                    "trade executed: symbol={} qty={} px_ticks={} buy_id={} sell_id={}",
                    trade.symbol, trade.qty, trade.px_ticks, trade.buy_order_id, trade.sell_order_id
                );

                if let Some(sink) = trade_sink.as_ref() {
                    sink(&trade);
                }
                trades.push(trade);

                if resting.remaining == 0 {
                    level.pop_front();
                    *total_orders -= 1;
                }
                level.is_empty()
            };

            if level_emptied {
                opposite.remove_level(best_px);
            }
        }

        trades
    }

    /// Cancels a resting order by id, searching every level of both
    /// sides. Fully filled orders are gone from the book and report
    /// [`CancelOutcome::NotFound`].
    pub fn cancel(&mut self, id: OrderId) -> CancelOutcome {
        let removed = self
            .bids
            .remove_order(id)
            .or_else(|| self.asks.remove_order(id));

        match removed {
            Some(order) => {
                self.total_orders -= 1;
                info!(
                    "order cancelled: id={} symbol={} remaining={}",
                    order.id, self.symbol, order.remaining
                );
                CancelOutcome::Cancelled { order }
            }
            None => {
                debug!("cancel miss: id={} symbol={}", id, self.symbol);
                CancelOutcome::NotFound
            }
        }
    }

    /// Read-only view of the book; levels ascending by price on both
    /// sides, orders in FIFO order within each level.
    pub fn snapshot(&self) -> BookSnapshot {
        fn collect(tree: &PriceTree) -> Vec<LevelSnapshot> {
            tree.iter_levels()
                .map(|(px_ticks, level)| LevelSnapshot {
                    px_ticks,
                    orders: level
                        .iter()
                        .map(|o| OrderSnapshot {
                            id: o.id,
                            remaining: o.remaining,
                            side: o.side,
                        })
                        .collect(),
                })
                .collect()
        }

        BookSnapshot {
            symbol: self.symbol.clone(),
            bids: collect(&self.bids),
            asks: collect(&self.asks),
        }
    }
}
