//! Subscription registry and waiter bookkeeping.
//!
//! The registry tracks every logical subscription by its canonical message
//! hash and exclusively owns both the subscription entries and the replica
//! store. All subscription mutation happens under one lock, so concurrent
//! watch callers and the routing task never race on an entry.
//!
//! Waiters are one-shot: a resolution fulfills every waiter registered at
//! that moment and clears the set atomically. A watch call is satisfied by
//! exactly the next resolution after it registered, never by replay of past
//! updates.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

use super::store::BookStore;
use crate::domain::{OrderBook, Symbol};
use crate::error::WatchError;

type WaitResult = Result<OrderBook, WatchError>;

/// A pending one-shot completion handle for one in-flight watch call.
///
/// Dropping a waiter detaches it from the subscription without disturbing
/// other waiters on the same hash; callers compose timeouts that way.
pub struct Waiter {
    rx: oneshot::Receiver<WaitResult>,
}

impl Waiter {
    /// Suspend until the subscription resolves or rejects.
    pub async fn wait(self) -> WaitResult {
        match self.rx.await {
            Ok(result) => result,
            // Sender dropped without resolving: the subscription was
            // discarded out from under us.
            Err(_) => Err(WatchError::ConnectionClosed {
                reason: "subscription dropped".into(),
            }),
        }
    }
}

/// Whether a subscribe call must emit a control frame.
///
/// Exactly one caller per hash observes [`SubscribeAction::Send`]; everyone
/// else attaches a waiter to the existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAction {
    /// First subscriber for this hash: send the subscribe frame.
    Send,
    /// A subscription already exists (Requesting or Active): do not re-send.
    AlreadyRequested,
}

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Subscribe frame sent, nothing resolved yet.
    Requesting,
    /// The venue acknowledged or data arrived.
    Active,
}

struct Subscription {
    symbol: Symbol,
    state: SubscriptionState,
    waiters: Vec<oneshot::Sender<WaitResult>>,
}

/// Registry of live subscriptions, keyed by canonical message hash.
pub struct SubscriptionRegistry {
    subs: Mutex<HashMap<String, Subscription>>,
    books: BookStore,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
            books: BookStore::new(),
        }
    }

    /// The replica store owned by this registry.
    #[must_use]
    pub fn books(&self) -> &BookStore {
        &self.books
    }

    /// Register a waiter for `hash`, creating the subscription if absent.
    ///
    /// The returned action tells the caller whether it must send the
    /// subscribe frame; the create-or-attach decision is made under the
    /// registry lock, so at most one frame goes out per hash no matter how
    /// many callers race here.
    pub fn subscribe(&self, hash: &str, symbol: &Symbol) -> (Waiter, SubscribeAction) {
        let (tx, rx) = oneshot::channel();
        let mut subs = self.subs.lock();

        let action = match subs.get_mut(hash) {
            Some(sub) => {
                sub.waiters.push(tx);
                SubscribeAction::AlreadyRequested
            }
            None => {
                debug!(hash, symbol = %symbol, "Creating subscription");
                subs.insert(
                    hash.to_string(),
                    Subscription {
                        symbol: symbol.clone(),
                        state: SubscriptionState::Requesting,
                        waiters: vec![tx],
                    },
                );
                SubscribeAction::Send
            }
        };

        (Waiter { rx }, action)
    }

    /// Mark the subscription active and fulfill every currently registered
    /// waiter with a copy of `book`, clearing the waiter set atomically.
    ///
    /// Unknown hashes are ignored (the subscription may have been unwatched
    /// while the frame was in flight).
    pub fn resolve(&self, hash: &str, book: &OrderBook) {
        let waiters = {
            let mut subs = self.subs.lock();
            let Some(sub) = subs.get_mut(hash) else {
                return;
            };
            sub.state = SubscriptionState::Active;
            std::mem::take(&mut sub.waiters)
        };

        for waiter in waiters {
            // A closed receiver means the caller timed out or was dropped.
            let _ = waiter.send(Ok(book.clone()));
        }
    }

    /// Mark the subscription active without touching waiters or replicas.
    ///
    /// Used for acks that carry no levels: they confirm the subscription
    /// but must not masquerade as an empty snapshot.
    pub fn acknowledge(&self, hash: &str) {
        if let Some(sub) = self.subs.lock().get_mut(hash) {
            sub.state = SubscriptionState::Active;
        }
    }

    /// Fail every current waiter with `error` and remove the subscription
    /// and its replica.
    pub fn reject(&self, hash: &str, error: WatchError) {
        let removed = self.subs.lock().remove(hash);
        if let Some(sub) = removed {
            debug!(hash, symbol = %sub.symbol, "Rejecting subscription");
            self.books.remove(&sub.symbol);
            for waiter in sub.waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
    }

    /// Remove the subscription and its replica without failing waiters
    /// loudly (they observe the drop). Returns the symbol if one existed,
    /// so the caller can emit a best-effort unsubscribe frame.
    pub fn remove(&self, hash: &str) -> Option<Symbol> {
        let sub = self.subs.lock().remove(hash)?;
        self.books.remove(&sub.symbol);
        Some(sub.symbol)
    }

    /// Connection teardown: reject every pending waiter across every
    /// subscription with `ConnectionClosed`, clear all subscription state
    /// and every replica. Nothing survives to be treated as fresh after a
    /// reconnect.
    pub fn disconnect(&self, reason: &str) {
        let subs: Vec<Subscription> = {
            let mut map = self.subs.lock();
            map.drain().map(|(_, sub)| sub).collect()
        };
        self.books.clear();

        let error = WatchError::ConnectionClosed {
            reason: reason.to_string(),
        };
        for sub in subs {
            for waiter in sub.waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
    }

    /// Current state of a subscription, if one exists.
    #[must_use]
    pub fn state(&self, hash: &str) -> Option<SubscriptionState> {
        self.subs.lock().get(hash).map(|sub| sub.state)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of waiters currently pending on a hash.
    #[must_use]
    pub fn pending_waiters(&self, hash: &str) -> usize {
        self.subs
            .lock()
            .get(hash)
            .map_or(0, |sub| sub.waiters.len())
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::{PriceLevel, Side};

    fn symbol() -> Symbol {
        Symbol::new("BTC/USD", "BTC-USD")
    }

    fn book() -> OrderBook {
        let mut book = OrderBook::new(symbol());
        book.store(Side::Bid, dec!(100), dec!(1));
        book
    }

    // -------------------------------------------------------------------------
    // Subscribe Deduplication
    // -------------------------------------------------------------------------

    #[test]
    fn first_subscriber_sends_later_ones_attach() {
        let registry = SubscriptionRegistry::new();

        let (_w1, a1) = registry.subscribe("level2:BTC-USD", &symbol());
        let (_w2, a2) = registry.subscribe("level2:BTC-USD", &symbol());
        let (_w3, a3) = registry.subscribe("level2:BTC-USD", &symbol());

        assert_eq!(a1, SubscribeAction::Send);
        assert_eq!(a2, SubscribeAction::AlreadyRequested);
        assert_eq!(a3, SubscribeAction::AlreadyRequested);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.pending_waiters("level2:BTC-USD"), 3);
    }

    #[test]
    fn distinct_hashes_each_send() {
        let registry = SubscriptionRegistry::new();
        let eth = Symbol::new("ETH/USD", "ETH-USD");

        let (_w1, a1) = registry.subscribe("level2:BTC-USD", &symbol());
        let (_w2, a2) = registry.subscribe("level2:ETH-USD", &eth);

        assert_eq!(a1, SubscribeAction::Send);
        assert_eq!(a2, SubscribeAction::Send);
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn resolve_fulfills_all_current_waiters() {
        let registry = SubscriptionRegistry::new();
        let (w1, _) = registry.subscribe("h", &symbol());
        let (w2, _) = registry.subscribe("h", &symbol());

        registry.resolve("h", &book());

        let b1 = w1.wait().await.unwrap();
        let b2 = w2.wait().await.unwrap();
        assert_eq!(b1.best_bid().unwrap().price(), dec!(100));
        assert_eq!(b2.best_bid().unwrap().price(), dec!(100));
        assert_eq!(registry.state("h"), Some(SubscriptionState::Active));
        assert_eq!(registry.pending_waiters("h"), 0);
    }

    #[tokio::test]
    async fn waiter_registered_after_resolution_waits_for_next_one() {
        let registry = SubscriptionRegistry::new();
        let (w1, _) = registry.subscribe("h", &symbol());
        registry.resolve("h", &book());
        w1.wait().await.unwrap();

        // Registers against a fresh empty waiter set.
        let (w2, action) = registry.subscribe("h", &symbol());
        assert_eq!(action, SubscribeAction::AlreadyRequested);
        assert_eq!(registry.pending_waiters("h"), 1);

        let mut updated = book();
        updated.store(Side::Bid, dec!(101), dec!(2));
        registry.resolve("h", &updated);

        let b2 = w2.wait().await.unwrap();
        assert_eq!(b2.best_bid().unwrap().price(), dec!(101));
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_disturb_others() {
        let registry = SubscriptionRegistry::new();
        let (w1, _) = registry.subscribe("h", &symbol());
        let (w2, _) = registry.subscribe("h", &symbol());
        drop(w1);

        registry.resolve("h", &book());
        assert!(w2.wait().await.is_ok());
    }

    #[test]
    fn resolve_unknown_hash_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.resolve("missing", &book());
        assert!(registry.is_empty());
    }

    // -------------------------------------------------------------------------
    // Rejection and Teardown
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn reject_fails_waiters_and_removes_subscription() {
        let registry = SubscriptionRegistry::new();
        let (w, _) = registry.subscribe("h", &symbol());

        registry.reject(
            "h",
            WatchError::SubscriptionFailed {
                message: "venue said no".into(),
            },
        );

        let err = w.wait().await.unwrap_err();
        assert!(matches!(err, WatchError::SubscriptionFailed { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn disconnect_rejects_everything_and_clears_replicas() {
        let registry = SubscriptionRegistry::new();
        let eth = Symbol::new("ETH/USD", "ETH-USD");
        let (w1, _) = registry.subscribe("level2:BTC-USD", &symbol());
        let (w2, _) = registry.subscribe("level2:ETH-USD", &eth);
        registry
            .books()
            .load_snapshot(&symbol(), &[PriceLevel::new(dec!(10), dec!(1))], &[], None)
            .unwrap();

        registry.disconnect("transport closed");

        for waiter in [w1, w2] {
            let err = waiter.wait().await.unwrap_err();
            assert!(matches!(err, WatchError::ConnectionClosed { .. }));
        }
        assert!(registry.is_empty());
        assert!(registry.books().is_empty());
    }

    #[test]
    fn remove_discards_subscription_and_replica() {
        let registry = SubscriptionRegistry::new();
        let (_w, _) = registry.subscribe("h", &symbol());
        registry
            .books()
            .load_snapshot(&symbol(), &[PriceLevel::new(dec!(10), dec!(1))], &[], None)
            .unwrap();

        let removed = registry.remove("h");
        assert_eq!(removed, Some(symbol()));
        assert!(registry.is_empty());
        assert!(registry.books().is_empty());
    }

    #[test]
    fn acknowledge_marks_active_without_resolving() {
        let registry = SubscriptionRegistry::new();
        let (_w, _) = registry.subscribe("h", &symbol());

        registry.acknowledge("h");

        assert_eq!(registry.state("h"), Some(SubscriptionState::Active));
        assert_eq!(registry.pending_waiters("h"), 1);
    }
}
