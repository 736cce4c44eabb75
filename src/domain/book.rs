//! Order book types for market depth representation.
//!
//! - [`PriceLevel`] - A single price level with size
//! - [`BookSide`] - One side of a book, sorted, unique price per entry
//! - [`OrderBook`] - The full replica maintained for a symbol
//! - [`OrderBookView`] - A depth-limited read-only projection
//!
//! # Structure
//!
//! An order book has two sides:
//! - **Bids**: buy interest, iterated by price descending (best bid first)
//! - **Asks**: sell interest, iterated by price ascending (best ask first)
//!
//! Sides are backed by an ordered map keyed by price, so an upsert or delete
//! is logarithmic and the sorted-unique invariant holds structurally; no
//! merge ever re-sorts a side.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::symbol::Symbol;

/// A single price level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    price: Decimal,
    size: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    #[must_use]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Returns the price at this level.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Returns the total size available at this level.
    #[must_use]
    pub const fn size(&self) -> Decimal {
        self.size
    }
}

/// Which side of the book a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Buy side, best price is the highest.
    Bid,
    /// Sell side, best price is the lowest.
    Ask,
}

/// One side of an order book.
///
/// Prices are unique; a write at an existing price replaces the size, a
/// write with size zero deletes the level. Iteration is always best-first.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Decimal, Decimal>,
}

impl BookSide {
    /// Creates an empty side.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Upsert-or-delete at `price`: size zero removes the level (no-op if
    /// absent), any other size inserts or replaces it.
    pub fn store(&mut self, price: Decimal, size: Decimal) {
        if size.is_zero() {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, size);
        }
    }

    /// Returns the size at `price`, if a level exists there.
    #[must_use]
    pub fn size_at(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Returns the best level (highest bid, lowest ask).
    #[must_use]
    pub fn best(&self) -> Option<PriceLevel> {
        self.iter().next()
    }

    /// Returns all levels, best price first.
    #[must_use]
    pub fn levels(&self) -> Vec<PriceLevel> {
        self.iter().collect()
    }

    /// Returns up to `limit` levels, best price first. `None` returns the
    /// full side.
    #[must_use]
    pub fn top(&self, limit: Option<usize>) -> Vec<PriceLevel> {
        match limit {
            Some(n) => self.iter().take(n).collect(),
            None => self.levels(),
        }
    }

    /// Number of levels on this side.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let to_level = |(price, size): (&Decimal, &Decimal)| PriceLevel::new(*price, *size);
        match self.side {
            Side::Bid => Box::new(self.levels.iter().rev().map(to_level)),
            Side::Ask => Box::new(self.levels.iter().map(to_level)),
        }
    }
}

/// The full order book replica maintained for one symbol.
///
/// Retains full depth at all times; any externally exposed depth limit is
/// applied to [`OrderBook::view`] output only, never to the retained levels.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: Symbol,
    bids: BookSide,
    asks: BookSide,
    timestamp: Option<DateTime<Utc>>,
}

impl OrderBook {
    /// Creates a new empty order book.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            timestamp: None,
        }
    }

    /// Returns the symbol this book replicates.
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns the bid side.
    #[must_use]
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    /// Returns the ask side.
    #[must_use]
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Returns the best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Returns the best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Timestamp of the last applied message, if the venue provided one.
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) {
        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
    }

    /// Upsert-or-delete one level on the given side.
    pub fn store(&mut self, side: Side, price: Decimal, size: Decimal) {
        match side {
            Side::Bid => self.bids.store(price, size),
            Side::Ask => self.asks.store(price, size),
        }
    }

    /// True when the best bid meets or exceeds the best ask. Treated as a
    /// protocol violation by the replica store.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price() >= ask.price(),
            _ => false,
        }
    }

    /// Produce a depth-limited read-only view; the retained book is
    /// untouched.
    #[must_use]
    pub fn view(&self, depth: Option<usize>) -> OrderBookView {
        OrderBookView {
            symbol: self.symbol.clone(),
            bids: self.bids.top(depth),
            asks: self.asks.top(depth),
            timestamp: self.timestamp,
        }
    }
}

/// Depth-limited read-only projection of an [`OrderBook`].
#[derive(Debug, Clone)]
pub struct OrderBookView {
    symbol: Symbol,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    timestamp: Option<DateTime<Utc>>,
}

impl OrderBookView {
    /// Returns the symbol this view belongs to.
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Bid levels, best first, truncated to the requested depth.
    #[must_use]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    /// Ask levels, best first, truncated to the requested depth.
    #[must_use]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// Returns the best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Returns the best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Timestamp of the last applied message, if the venue provided one.
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::new("BTC/USD", "BTC-USD")
    }

    // -------------------------------------------------------------------------
    // BookSide Tests
    // -------------------------------------------------------------------------

    #[test]
    fn bids_iterate_descending() {
        let mut side = BookSide::new(Side::Bid);
        side.store(dec!(99), dec!(1));
        side.store(dec!(101), dec!(2));
        side.store(dec!(100), dec!(3));

        let prices: Vec<_> = side.levels().iter().map(|l| l.price()).collect();
        assert_eq!(prices, vec![dec!(101), dec!(100), dec!(99)]);
    }

    #[test]
    fn asks_iterate_ascending() {
        let mut side = BookSide::new(Side::Ask);
        side.store(dec!(102), dec!(1));
        side.store(dec!(100), dec!(2));
        side.store(dec!(101), dec!(3));

        let prices: Vec<_> = side.levels().iter().map(|l| l.price()).collect();
        assert_eq!(prices, vec![dec!(100), dec!(101), dec!(102)]);
    }

    #[test]
    fn store_replaces_existing_price() {
        let mut side = BookSide::new(Side::Bid);
        side.store(dec!(100), dec!(1));
        side.store(dec!(100), dec!(5));

        assert_eq!(side.len(), 1);
        assert_eq!(side.size_at(dec!(100)), Some(dec!(5)));
    }

    #[test]
    fn zero_size_removes_level() {
        let mut side = BookSide::new(Side::Ask);
        side.store(dec!(100), dec!(1));
        side.store(dec!(100), dec!(0));

        assert!(side.is_empty());
        assert_eq!(side.size_at(dec!(100)), None);
    }

    #[test]
    fn zero_size_on_absent_price_is_noop() {
        let mut side = BookSide::new(Side::Ask);
        side.store(dec!(100), dec!(1));
        side.store(dec!(999), dec!(0));

        assert_eq!(side.len(), 1);
    }

    #[test]
    fn store_is_idempotent() {
        let mut once = BookSide::new(Side::Bid);
        once.store(dec!(100), dec!(3));

        let mut twice = BookSide::new(Side::Bid);
        twice.store(dec!(100), dec!(3));
        twice.store(dec!(100), dec!(3));

        assert_eq!(once.levels(), twice.levels());
    }

    #[test]
    fn top_truncates_without_mutating() {
        let mut side = BookSide::new(Side::Bid);
        for i in 0..10 {
            side.store(Decimal::from(100 + i), dec!(1));
        }

        let top = side.top(Some(3));
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].price(), dec!(109));
        // Full depth is retained.
        assert_eq!(side.len(), 10);
    }

    #[test]
    fn top_without_limit_returns_all() {
        let mut side = BookSide::new(Side::Ask);
        side.store(dec!(100), dec!(1));
        side.store(dec!(101), dec!(1));

        assert_eq!(side.top(None).len(), 2);
    }

    // -------------------------------------------------------------------------
    // OrderBook Tests
    // -------------------------------------------------------------------------

    #[test]
    fn best_bid_and_ask() {
        let mut book = OrderBook::new(symbol());
        book.store(Side::Bid, dec!(99), dec!(1));
        book.store(Side::Bid, dec!(100), dec!(2));
        book.store(Side::Ask, dec!(101), dec!(3));
        book.store(Side::Ask, dec!(102), dec!(4));

        assert_eq!(book.best_bid().unwrap().price(), dec!(100));
        assert_eq!(book.best_ask().unwrap().price(), dec!(101));
        assert!(!book.is_crossed());
    }

    #[test]
    fn crossed_book_is_detected() {
        let mut book = OrderBook::new(symbol());
        book.store(Side::Bid, dec!(101), dec!(1));
        book.store(Side::Ask, dec!(100), dec!(1));

        assert!(book.is_crossed());
    }

    #[test]
    fn one_sided_book_is_not_crossed() {
        let mut book = OrderBook::new(symbol());
        book.store(Side::Bid, dec!(101), dec!(1));

        assert!(!book.is_crossed());
    }

    #[test]
    fn view_applies_depth_limit_only_to_output() {
        let mut book = OrderBook::new(symbol());
        for i in 0..5 {
            book.store(Side::Bid, Decimal::from(100 - i), dec!(1));
            book.store(Side::Ask, Decimal::from(101 + i), dec!(1));
        }

        let view = book.view(Some(2));
        assert_eq!(view.bids().len(), 2);
        assert_eq!(view.asks().len(), 2);
        assert_eq!(view.best_bid().unwrap().price(), dec!(100));
        assert_eq!(view.best_ask().unwrap().price(), dec!(101));

        // Retained book keeps full depth.
        assert_eq!(book.bids().len(), 5);
        assert_eq!(book.asks().len(), 5);
    }

    #[test]
    fn set_timestamp_ignores_none() {
        let mut book = OrderBook::new(symbol());
        let ts = Utc::now();
        book.set_timestamp(Some(ts));
        book.set_timestamp(None);

        assert_eq!(book.timestamp(), Some(ts));
    }
}
