//! Decoded inbound frames.
//!
//! An [`Envelope`] is what the wire codec hands to the router: the venue's
//! type tag mapped onto a fixed enum variant (dispatch is a match, never a
//! string lookup at routing time) with payload levels already normalized to
//! decimal price/size pairs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::book::{PriceLevel, Side};

/// A decoded inbound frame, tagged by message kind.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Full book state; replaces any existing replica wholesale.
    Snapshot {
        venue_id: String,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// Incremental changes, in arrival order.
    Delta {
        venue_id: String,
        changes: Vec<(Side, Decimal, Decimal)>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// Subscription acknowledgement. Carries no levels; never treated as an
    /// empty snapshot.
    Ack { venue_id: Option<String> },
    /// Venue-reported error, optionally attributable to one subscription.
    VenueError {
        venue_id: Option<String>,
        message: String,
    },
    /// Unrecognized type tag; logged and dropped.
    Unknown,
}
