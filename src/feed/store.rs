//! Order book replica store.
//!
//! Holds one [`OrderBook`] replica per synced symbol. A symbol is either
//! absent (no replica: deltas are rejected until a snapshot arrives) or
//! synced (snapshot loaded: deltas merge incrementally). Disconnects clear
//! every replica, so nothing is ever treated as fresh across reconnects.
//!
//! Reads clone the book under the lock, so a reader observes either the
//! pre-update or the fully merged post-update state, never a partially
//! applied delta.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

use crate::domain::{OrderBook, PriceLevel, Side, Symbol};
use crate::error::StoreError;

/// Thread-safe store of order book replicas.
pub struct BookStore {
    books: RwLock<HashMap<Symbol, OrderBook>>,
}

impl BookStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
        }
    }

    /// Load a snapshot, replacing any existing replica wholesale.
    ///
    /// Returns the resulting book. A snapshot that is already crossed is
    /// rejected and leaves the symbol without a replica.
    pub fn load_snapshot(
        &self,
        symbol: &Symbol,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<OrderBook, StoreError> {
        let mut book = OrderBook::new(symbol.clone());
        for level in bids {
            book.store(Side::Bid, level.price(), level.size());
        }
        for level in asks {
            book.store(Side::Ask, level.price(), level.size());
        }
        book.set_timestamp(timestamp);

        if book.is_crossed() {
            warn!(symbol = %symbol, "Rejecting crossed snapshot");
            self.books.write().remove(symbol);
            return Err(StoreError::CrossedBook);
        }

        self.books.write().insert(symbol.clone(), book.clone());
        Ok(book)
    }

    /// Merge one batch of deltas into the replica for `symbol`.
    ///
    /// Changes apply in arrival order, so later writes for the same price
    /// override earlier ones. Returns the merged book. With no replica the
    /// batch is not applied and `NoReplica` is returned; a merge that leaves
    /// the book crossed discards the replica and returns `CrossedBook`, so a
    /// fresh snapshot is required rather than a best-effort patch.
    pub fn apply_deltas(
        &self,
        symbol: &Symbol,
        changes: &[(Side, Decimal, Decimal)],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<OrderBook, StoreError> {
        let mut books = self.books.write();
        let book = books.get_mut(symbol).ok_or(StoreError::NoReplica)?;

        for &(side, price, size) in changes {
            book.store(side, price, size);
        }
        book.set_timestamp(timestamp);

        if book.is_crossed() {
            warn!(symbol = %symbol, "Merge produced a crossed book, discarding replica");
            books.remove(symbol);
            return Err(StoreError::CrossedBook);
        }

        Ok(book.clone())
    }

    /// Get an atomic copy of a replica.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<OrderBook> {
        self.books.read().get(symbol).cloned()
    }

    /// Discard the replica for one symbol.
    pub fn remove(&self, symbol: &Symbol) {
        self.books.write().remove(symbol);
    }

    /// Discard every replica (connection teardown).
    pub fn clear(&self) {
        self.books.write().clear();
    }

    /// Number of synced symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}
