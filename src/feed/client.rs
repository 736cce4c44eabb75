//! Connection manager and the public watch surface.
//!
//! [`WatchClient`] owns canonical message-hash construction, so subscribe,
//! resolve and unsubscribe all agree on the same key regardless of caller,
//! and guarantees the wire carries exactly one subscribe frame per active
//! hash even under many concurrent local watch calls.
//!
//! The run loop is the single consumer of the inbound stream: frames are
//! routed strictly in arrival order, and outbound control frames are
//! multiplexed onto the same session through an unbounded channel.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::registry::{SubscribeAction, SubscriptionRegistry};
use super::router::{FeedStats, Router};
use crate::domain::{OrderBookView, Symbol};
use crate::error::{Error, Result};
use crate::port::{ExchangeDescriptor, Transport, TransportEvent};

/// Canonical key identifying one logical subscription.
#[must_use]
pub fn message_hash(channel: &str, venue_id: &str) -> String {
    format!("{channel}:{venue_id}")
}

enum Step {
    Outbound(Option<String>),
    Inbound(Option<TransportEvent>),
}

/// Client for watching live order books over one connection.
pub struct WatchClient {
    descriptor: Arc<dyn ExchangeDescriptor>,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<FeedStats>,
    out_tx: mpsc::UnboundedSender<String>,
    out_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl WatchClient {
    #[must_use]
    pub fn new(descriptor: Arc<dyn ExchangeDescriptor>) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        Self {
            descriptor,
            registry: Arc::new(SubscriptionRegistry::new()),
            stats: Arc::new(FeedStats::default()),
            out_tx,
            out_rx: tokio::sync::Mutex::new(out_rx),
        }
    }

    /// The subscription registry (and replica store) behind this client.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Feed counters.
    #[must_use]
    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Watch the order book for `symbol`, suspending until the next
    /// snapshot or delta resolves it.
    ///
    /// Registers a one-shot waiter and, for the first caller on a hash,
    /// sends the subscribe control frame. The returned view is depth-limited
    /// to `depth` levels per side; the retained replica keeps full depth.
    /// Callers wanting a further update call watch again; callers wanting a
    /// deadline wrap this future in `tokio::time::timeout` (dropping it
    /// detaches the waiter without disturbing others).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSymbol`] when the descriptor does not know the
    /// symbol; [`Error::Watch`] when the subscription is rejected or the
    /// connection closes.
    pub async fn watch(&self, symbol: &Symbol, depth: Option<usize>) -> Result<OrderBookView> {
        if self.descriptor.symbol_for(symbol.venue_id()).is_none() {
            return Err(Error::UnknownSymbol(symbol.name().to_string()));
        }

        let channel = self.descriptor.book_channel();
        let hash = message_hash(channel, symbol.venue_id());
        let (waiter, action) = self.registry.subscribe(&hash, symbol);

        if action == SubscribeAction::Send {
            debug!(%hash, "Sending subscribe frame");
            let frame = self.descriptor.subscribe_frame(channel, symbol.venue_id());
            let _ = self.out_tx.send(frame);
        }

        let book = waiter.wait().await?;
        Ok(book.view(depth))
    }

    /// Stop watching `symbol`: discard its subscription and replica and
    /// send a best-effort unsubscribe frame.
    pub fn unwatch(&self, symbol: &Symbol) {
        let channel = self.descriptor.book_channel();
        let hash = message_hash(channel, symbol.venue_id());
        if self.registry.remove(&hash).is_some() {
            debug!(%hash, "Sending unsubscribe frame");
            let frame = self
                .descriptor
                .unsubscribe_frame(channel, symbol.venue_id());
            let _ = self.out_tx.send(frame);
        }
    }

    /// Drive one connection: connect the transport, pump queued outbound
    /// control frames, and route inbound envelopes in arrival order until
    /// the connection closes.
    ///
    /// On close every pending waiter is rejected with `ConnectionClosed`
    /// and every replica is discarded; a later call with a fresh transport
    /// drains control frames queued in the meantime, so post-disconnect
    /// watch calls subscribe on the new session.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<()> {
        // One run at a time: the inbound stream has exactly one consumer.
        let mut out_rx = self.out_rx.lock().await;
        let router = Router::new(
            self.descriptor.clone(),
            self.registry.clone(),
            self.stats.clone(),
        );

        transport.connect().await?;
        info!(transport = transport.name(), "Feed session started");

        loop {
            // Arms only pick the next step; transport I/O happens below,
            // after the competing borrow is released.
            let step = tokio::select! {
                maybe_frame = out_rx.recv() => Step::Outbound(maybe_frame),
                event = transport.next_event() => Step::Inbound(event),
            };

            match step {
                Step::Outbound(Some(frame)) => {
                    if let Err(e) = transport.send(frame).await {
                        warn!(error = %e, "Failed to send control frame");
                        self.registry.disconnect("send failed");
                        return Err(e);
                    }
                }
                // The client holds a sender for its whole lifetime, so the
                // outbound channel never closes while we are running.
                Step::Outbound(None) => {}
                Step::Inbound(Some(TransportEvent::Envelope(envelope))) => router.route(envelope),
                Step::Inbound(Some(TransportEvent::Closed { reason })) => {
                    info!(reason, "Feed session closed");
                    self.registry.disconnect(&reason);
                    return Ok(());
                }
                Step::Inbound(None) => {
                    info!("Feed stream ended");
                    self.registry.disconnect("stream ended");
                    return Ok(());
                }
            }
        }
    }
}
