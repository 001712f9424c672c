use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which side of the book an order rests on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an incoming order matches against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Crossing test against a resting price. Ties are matches.
    pub fn crosses(self, taker_px: i64, resting_px: i64) -> bool {
        match self {
            Side::Buy => taker_px >= resting_px,
            Side::Sell => taker_px <= resting_px,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Engine-assigned order identifier, unique for the lifetime of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A limit order submission before the book has stamped identity and
/// arrival order onto it. Client-supplied ids are not carried here; the
/// engine assigns its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub symbol: String,
    pub side: Side,
    /// Price in integer ticks (1 tick = 0.0001). Strictly positive.
    pub px_ticks: i64,
    /// Total quantity in whole lots. Strictly positive.
    pub qty: u64,
}

/// A live order inside a book.
///
/// Immutable after admission except for `remaining`, which only decreases
/// while the matcher fills it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub px_ticks: i64,
    pub qty: u64,
    pub remaining: u64,
    /// Per-book arrival sequence; defines time priority within a level.
    pub seq: u64,
}

/// One executed match. Emitted to the trade sink, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    pub trade_id: u64,
    pub symbol: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    /// Execution price in ticks: always the resting order's price.
    pub px_ticks: i64,
    pub qty: u64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub ts_ms: u64,
}

/// Monotonic id allocation shared by every book in one engine.
///
/// Order ids and trade ids are separate sequences, both starting at 1.
#[derive(Debug, Default)]
pub struct IdSource {
    orders: AtomicU64,
    trades: AtomicU64,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&self) -> OrderId {
        OrderId(self.orders.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn next_trade_id(&self) -> u64 {
        self.trades.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Point-in-time view of one order inside a level snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub remaining: u64,
    pub side: Side,
}

/// One price level in a snapshot: live orders in FIFO order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSnapshot {
    pub px_ticks: i64,
    pub orders: Vec<OrderSnapshot>,
}

/// Read-only view of a whole book. Levels are listed in ascending price
/// order on both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookSnapshot {
    pub symbol: String,
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
