//! Inbound frame router.
//!
//! Dispatches each decoded [`Envelope`] by its enum variant to the handler
//! that updates the replica store and resolves or rejects the registry.
//! Every failure here is local to one frame and one symbol: malformed or
//! unattributable frames are counted and dropped, out-of-sequence deltas
//! leave the subscription alive, and nothing a single symbol does can
//! affect another symbol's subscription.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::client::message_hash;
use super::registry::SubscriptionRegistry;
use crate::domain::{Envelope, PriceLevel, Side};
use crate::error::{StoreError, WatchError};
use crate::port::ExchangeDescriptor;

/// Counters for feed observability.
#[derive(Debug, Default)]
pub struct FeedStats {
    frames_routed: AtomicU64,
    out_of_sequence: AtomicU64,
    protocol_errors: AtomicU64,
}

impl FeedStats {
    /// Total envelopes routed, including dropped ones.
    pub fn frames_routed(&self) -> u64 {
        self.frames_routed.load(Ordering::Relaxed)
    }

    /// Deltas dropped because no replica existed yet.
    pub fn out_of_sequence(&self) -> u64 {
        self.out_of_sequence.load(Ordering::Relaxed)
    }

    /// Frames dropped as malformed, unattributable, or invariant-violating.
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    pub(crate) fn record_frame(&self) {
        self.frames_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_out_of_sequence(&self) {
        self.out_of_sequence.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Routes decoded envelopes to the store and registry.
pub struct Router {
    descriptor: Arc<dyn ExchangeDescriptor>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<FeedStats>,
}

impl Router {
    pub fn new(
        descriptor: Arc<dyn ExchangeDescriptor>,
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<FeedStats>,
    ) -> Self {
        Self {
            descriptor,
            registry,
            stats,
        }
    }

    /// Route one envelope. Must be called in arrival order from a single
    /// task; delta correctness depends on it.
    pub fn route(&self, envelope: Envelope) {
        self.stats.record_frame();
        match envelope {
            Envelope::Snapshot {
                venue_id,
                bids,
                asks,
                timestamp,
            } => self.on_snapshot(&venue_id, &bids, &asks, timestamp),
            Envelope::Delta {
                venue_id,
                changes,
                timestamp,
            } => self.on_delta(&venue_id, &changes, timestamp),
            Envelope::Ack { venue_id } => self.on_ack(venue_id.as_deref()),
            Envelope::VenueError { venue_id, message } => {
                self.on_venue_error(venue_id.as_deref(), &message);
            }
            Envelope::Unknown => {
                debug!("Dropping frame with unrecognized type tag");
            }
        }
    }

    fn on_snapshot(
        &self,
        venue_id: &str,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        timestamp: Option<DateTime<Utc>>,
    ) {
        let Some(symbol) = self.descriptor.symbol_for(venue_id) else {
            self.stats.record_protocol_error();
            warn!(venue_id, "Snapshot for unknown symbol, dropping");
            return;
        };

        let hash = message_hash(self.descriptor.book_channel(), venue_id);
        match self
            .registry
            .books()
            .load_snapshot(symbol, bids, asks, timestamp)
        {
            Ok(book) => {
                trace!(symbol = %symbol, bids = bids.len(), asks = asks.len(), "Snapshot loaded");
                self.registry.resolve(&hash, &book);
            }
            Err(StoreError::CrossedBook) => {
                self.stats.record_protocol_error();
            }
            Err(StoreError::NoReplica) => unreachable!("snapshot load never requires a replica"),
        }
    }

    fn on_delta(
        &self,
        venue_id: &str,
        changes: &[(Side, Decimal, Decimal)],
        timestamp: Option<DateTime<Utc>>,
    ) {
        let Some(symbol) = self.descriptor.symbol_for(venue_id) else {
            self.stats.record_protocol_error();
            warn!(venue_id, "Delta for unknown symbol, dropping");
            return;
        };

        let hash = message_hash(self.descriptor.book_channel(), venue_id);
        match self.registry.books().apply_deltas(symbol, changes, timestamp) {
            Ok(book) => {
                trace!(symbol = %symbol, changes = changes.len(), "Delta merged");
                self.registry.resolve(&hash, &book);
            }
            Err(StoreError::NoReplica) => {
                // Out of sequence: the subscription stays alive and the next
                // snapshot resyncs it.
                self.stats.record_out_of_sequence();
                debug!(symbol = %symbol, "Delta before snapshot, dropping");
            }
            Err(StoreError::CrossedBook) => {
                self.stats.record_protocol_error();
            }
        }
    }

    fn on_ack(&self, venue_id: Option<&str>) {
        // An ack carries no levels: confirm the subscription, never treat it
        // as an empty snapshot.
        let Some(venue_id) = venue_id else {
            debug!("Subscription ack without symbol");
            return;
        };
        let hash = message_hash(self.descriptor.book_channel(), venue_id);
        self.registry.acknowledge(&hash);
        debug!(venue_id, "Subscription acknowledged");
    }

    fn on_venue_error(&self, venue_id: Option<&str>, message: &str) {
        let Some(venue_id) = venue_id else {
            self.stats.record_protocol_error();
            warn!(message, "Venue error without symbol, dropping");
            return;
        };

        let hash = message_hash(self.descriptor.book_channel(), venue_id);
        warn!(venue_id, message, "Venue rejected subscription");
        self.registry.reject(
            &hash,
            WatchError::SubscriptionFailed {
                message: message.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::Symbol;
    use crate::port::StaticDescriptor;

    fn setup() -> (Router, Arc<SubscriptionRegistry>, Arc<FeedStats>, Symbol) {
        let symbol = Symbol::new("BTC/USD", "BTC-USD");
        let descriptor = Arc::new(StaticDescriptor::new("level2", vec![symbol.clone()]));
        let registry = Arc::new(SubscriptionRegistry::new());
        let stats = Arc::new(FeedStats::default());
        let router = Router::new(descriptor, registry.clone(), stats.clone());
        (router, registry, stats, symbol)
    }

    fn snapshot_envelope() -> Envelope {
        Envelope::Snapshot {
            venue_id: "BTC-USD".into(),
            bids: vec![PriceLevel::new(dec!(100), dec!(1))],
            asks: vec![PriceLevel::new(dec!(101), dec!(1))],
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn snapshot_resolves_waiters() {
        let (router, registry, _, symbol) = setup();
        let (waiter, _) = registry.subscribe("level2:BTC-USD", &symbol);

        router.route(snapshot_envelope());

        let book = waiter.wait().await.unwrap();
        assert_eq!(book.best_bid().unwrap().price(), dec!(100));
    }

    #[tokio::test]
    async fn delta_after_snapshot_resolves_with_merged_book() {
        let (router, registry, _, symbol) = setup();
        router.route(snapshot_envelope());

        let (waiter, _) = registry.subscribe("level2:BTC-USD", &symbol);
        router.route(Envelope::Delta {
            venue_id: "BTC-USD".into(),
            changes: vec![(Side::Ask, dec!(101), dec!(2))],
            timestamp: None,
        });

        let book = waiter.wait().await.unwrap();
        assert_eq!(book.asks().size_at(dec!(101)), Some(dec!(2)));
    }

    #[test]
    fn delta_before_snapshot_is_counted_and_dropped() {
        let (router, registry, stats, symbol) = setup();
        let (_waiter, _) = registry.subscribe("level2:BTC-USD", &symbol);

        router.route(Envelope::Delta {
            venue_id: "BTC-USD".into(),
            changes: vec![(Side::Bid, dec!(100), dec!(1))],
            timestamp: None,
        });

        assert_eq!(stats.out_of_sequence(), 1);
        // The subscription stays alive.
        assert_eq!(registry.len(), 1);
        assert!(registry.books().is_empty());
    }

    #[test]
    fn unknown_symbol_is_a_protocol_error() {
        let (router, _, stats, _) = setup();

        router.route(Envelope::Snapshot {
            venue_id: "DOGE-USD".into(),
            bids: vec![],
            asks: vec![],
            timestamp: None,
        });

        assert_eq!(stats.protocol_errors(), 1);
    }

    #[test]
    fn ack_does_not_clear_replica_or_resolve() {
        let (router, registry, _, symbol) = setup();
        router.route(snapshot_envelope());
        let (_waiter, _) = registry.subscribe("level2:BTC-USD", &symbol);

        router.route(Envelope::Ack {
            venue_id: Some("BTC-USD".into()),
        });

        // Replica intact, waiter still pending.
        assert!(registry.books().get(&symbol).is_some());
        assert_eq!(registry.pending_waiters("level2:BTC-USD"), 1);
    }

    #[tokio::test]
    async fn venue_error_rejects_subscription() {
        let (router, registry, _, symbol) = setup();
        let (waiter, _) = registry.subscribe("level2:BTC-USD", &symbol);

        router.route(Envelope::VenueError {
            venue_id: Some("BTC-USD".into()),
            message: "channel not available".into(),
        });

        let err = waiter.wait().await.unwrap_err();
        assert_eq!(
            err,
            WatchError::SubscriptionFailed {
                message: "channel not available".into()
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_tag_is_nonfatal() {
        let (router, _, stats, _) = setup();
        router.route(Envelope::Unknown);
        assert_eq!(stats.frames_routed(), 1);
        assert_eq!(stats.protocol_errors(), 0);
    }

    #[test]
    fn crossing_delta_forces_fresh_snapshot() {
        let (router, registry, stats, symbol) = setup();
        router.route(snapshot_envelope());

        router.route(Envelope::Delta {
            venue_id: "BTC-USD".into(),
            changes: vec![(Side::Bid, dec!(102), dec!(1))],
            timestamp: None,
        });

        assert_eq!(stats.protocol_errors(), 1);
        assert!(registry.books().get(&symbol).is_none());
    }
}
