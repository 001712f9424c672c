//! Multi-symbol book registry with centralised trade fan-out.
//!
//! Books are created lazily on first reference, bounded at
//! [`MAX_SYMBOLS`], and never evicted while the engine runs. Every book
//! shares one id source and reports its trades into one broadcast
//! channel, which WebSocket sessions subscribe to.

use dashmap::DashMap;
use orderbook::{IdSource, OrderBook, Trade, TradeSink};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// Upper bound on concurrently registered symbols.
pub const MAX_SYMBOLS: usize = 100;

/// Capacity of the trade broadcast channel. Slow sessions that fall this
/// far behind start dropping trade notifications, not engine work.
const TRADE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("symbol capacity reached ({MAX_SYMBOLS} books)")]
    CapacityExceeded,
}

pub type SharedBook = Arc<RwLock<OrderBook>>;

/// The cross-symbol registry: one lock-per-book, readers-writer access to
/// the map itself via `DashMap`.
pub struct Engine {
    books: DashMap<String, SharedBook>,
    // Serialises the create path only; lookups never touch it. Keeps the
    // MAX_SYMBOLS bound strict under concurrent creation.
    create_lock: Mutex<()>,
    ids: Arc<IdSource>,
    trade_tx: broadcast::Sender<Trade>,
}

impl Engine {
    pub fn new() -> Self {
        let (trade_tx, _) = broadcast::channel(TRADE_CHANNEL_CAPACITY);
        Self {
            books: DashMap::new(),
            create_lock: Mutex::new(()),
            ids: Arc::new(IdSource::new()),
            trade_tx,
        }
    }

    /// New receiver for the engine-wide trade stream.
    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.trade_tx.subscribe()
    }

    pub fn get(&self, symbol: &str) -> Option<SharedBook> {
        self.books.get(symbol).map(|entry| entry.value().clone())
    }

    /// Returns the book for `symbol`, creating it on first reference.
    /// Idempotent: concurrent callers for the same symbol all observe the
    /// same book.
    pub fn get_or_create(&self, symbol: &str) -> Result<SharedBook, EngineError> {
        if let Some(book) = self.get(symbol) {
            return Ok(book);
        }

        let _guard = match self.create_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another creator may have won while we waited for the lock.
        if let Some(book) = self.get(symbol) {
            return Ok(book);
        }
        if self.books.len() >= MAX_SYMBOLS {
            warn!("rejecting book for {symbol}: capacity of {MAX_SYMBOLS} symbols reached");
            return Err(EngineError::CapacityExceeded);
        }

        let book = self.new_book(symbol);
        self.books.insert(symbol.to_string(), book.clone());
        info!(
            "order book created for symbol: {symbol} ({} active)",
            self.books.len()
        );
        Ok(book)
    }

    fn new_book(&self, symbol: &str) -> SharedBook {
        let mut book = OrderBook::with_ids(symbol, self.ids.clone());
        let tx = self.trade_tx.clone();
        let sink: TradeSink = Arc::new(move |trade: &Trade| {
            // Send errors only mean no session is listening right now.
            let _ = tx.send(trade.clone());
        });
        book.set_trade_sink(sink);
        Arc::new(RwLock::new(book))
    }

    /// Every registered book with its symbol, sorted for deterministic
    /// iteration order.
    pub fn all_books(&self) -> Vec<(String, SharedBook)> {
        let mut books: Vec<(String, SharedBook)> = self
            .books
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        books.sort_by(|a, b| a.0.cmp(&b.0));
        books
    }

    pub fn symbols(&self) -> Vec<String> {
        self.all_books().into_iter().map(|(symbol, _)| symbol).collect()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Periodic status report, mirrored into the log.
    pub async fn log_status(&self, uptime: Duration) {
        info!(
            "=== engine status: uptime {}s, {} active books ===",
            uptime.as_secs(),
            self.book_count()
        );
        for (symbol, book) in self.all_books() {
            let book = book.read().await;
            let (bid, ask) = (book.best_bid(), book.best_ask());
            let spread = match (bid, ask) {
                (Some(b), Some(a)) => a - b,
                _ => 0,
            };
            info!(
                "  {symbol}: orders={} best_bid={:?} best_ask={:?} spread={}",
                book.total_orders(),
                bid,
                ask,
                spread
            );
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
