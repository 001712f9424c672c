use crate::types::{Order, OrderId, Side};
use std::collections::{BTreeMap, VecDeque};

// One side of a book: price levels in a BTreeMap keyed by ticks, each
// level a FIFO queue. Which end of the map is "best" depends on the side:
// - asks: lowest price first
// - bids: highest price first
// Empty levels are removed the moment their last order departs, so every
// level present in the map holds at least one live order.

/// FIFO queue of live orders sharing one price on one side.
#[derive(Debug, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
}

impl PriceLevel {
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of remaining quantity across the level.
    pub fn total_qty(&self) -> u64 {
        self.orders.iter().map(|o| o.remaining).sum()
    }

    /// The order with time priority at this price.
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub(crate) fn front_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    pub(crate) fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    pub(crate) fn remove_by_id(&mut self, id: OrderId) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == id)?;
        self.orders.remove(idx)
    }
}

/// Ordered map from price to level for one side of a book.
#[derive(Debug)]
pub struct PriceTree {
    side: Side,
    levels: BTreeMap<i64, PriceLevel>,
}

impl PriceTree {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of live orders across all levels.
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::len).sum()
    }

    /// Best price for this side: highest bid, lowest ask.
    pub fn best_price(&self) -> Option<i64> {
        match self.side {
            Side::Buy => self.levels.last_key_value().map(|(px, _)| *px),
            Side::Sell => self.levels.first_key_value().map(|(px, _)| *px),
        }
    }

    pub fn contains(&self, px_ticks: i64) -> bool {
        self.levels.contains_key(&px_ticks)
    }

    pub fn level(&self, px_ticks: i64) -> Option<&PriceLevel> {
        self.levels.get(&px_ticks)
    }

    /// Levels in ascending price order.
    pub fn iter_levels(&self) -> impl Iterator<Item = (i64, &PriceLevel)> {
        self.levels.iter().map(|(px, level)| (*px, level))
    }

    pub(crate) fn level_mut(&mut self, px_ticks: i64) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&px_ticks)
    }

    /// Appends at the tail of the order's level, creating the level first
    /// if this is the first order at that price.
    pub(crate) fn insert(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side);
        self.levels
            .entry(order.px_ticks)
            .or_default()
            .push_back(order);
    }

    pub(crate) fn remove_level(&mut self, px_ticks: i64) -> Option<PriceLevel> {
        self.levels.remove(&px_ticks)
    }

    /// Removes an order wherever it sits in this tree, collapsing its
    /// level if that leaves it empty. Scans every level, not just one
    /// spine of the map.
    pub(crate) fn remove_order(&mut self, id: OrderId) -> Option<Order> {
        let mut hit = None;
        for (&px, level) in self.levels.iter_mut() {
            if let Some(order) = level.remove_by_id(id) {
                hit = Some((px, order));
                break;
            }
        }
        let (px, order) = hit?;
        if self.levels.get(&px).map_or(false, PriceLevel::is_empty) {
            self.levels.remove(&px);
        }
        Some(order)
    }
}
