//! Exchange descriptor port.
//!
//! The descriptor is the thin mapping collaborator: it knows which symbols
//! exist, how the venue names them, which channel carries level-2 books,
//! and what subscribe/unsubscribe control frames look like on the wire.

use std::collections::HashMap;

use serde_json::json;

use crate::domain::Symbol;

/// Venue metadata needed to build and correlate subscriptions.
pub trait ExchangeDescriptor: Send + Sync {
    /// The channel name carrying level-2 order book data.
    fn book_channel(&self) -> &str;

    /// Map a venue-native id from an inbound frame back to its symbol.
    fn symbol_for(&self, venue_id: &str) -> Option<&Symbol>;

    /// All symbols this descriptor knows about.
    fn symbols(&self) -> &[Symbol];

    /// Build the subscribe control frame for one channel/instrument pair.
    fn subscribe_frame(&self, channel: &str, venue_id: &str) -> String;

    /// Build the unsubscribe control frame for one channel/instrument pair.
    fn unsubscribe_frame(&self, channel: &str, venue_id: &str) -> String;
}

/// A descriptor backed by a fixed symbol table, typically built from config.
pub struct StaticDescriptor {
    channel: String,
    symbols: Vec<Symbol>,
    by_venue_id: HashMap<String, Symbol>,
}

impl StaticDescriptor {
    /// Create a descriptor for a book channel and a fixed set of symbols.
    #[must_use]
    pub fn new(channel: impl Into<String>, symbols: Vec<Symbol>) -> Self {
        let by_venue_id = symbols
            .iter()
            .map(|s| (s.venue_id().to_string(), s.clone()))
            .collect();
        Self {
            channel: channel.into(),
            symbols,
            by_venue_id,
        }
    }
}

impl ExchangeDescriptor for StaticDescriptor {
    fn book_channel(&self) -> &str {
        &self.channel
    }

    fn symbol_for(&self, venue_id: &str) -> Option<&Symbol> {
        self.by_venue_id.get(venue_id)
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn subscribe_frame(&self, channel: &str, venue_id: &str) -> String {
        json!({
            "type": "subscribe",
            "channel": channel,
            "symbols": [venue_id],
        })
        .to_string()
    }

    fn unsubscribe_frame(&self, channel: &str, venue_id: &str) -> String {
        json!({
            "type": "unsubscribe",
            "channel": channel,
            "symbols": [venue_id],
        })
        .to_string()
    }
}
