//! Wire codec and field normalization.
//!
//! Venues send prices and sizes as strings; this module decodes raw frame
//! text into a typed [`Envelope`] with decimal price/size pairs. Levels
//! that fail to parse are filtered out with a warning rather than killing
//! the frame, matching how lenient feed parsers behave in practice.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{Envelope, PriceLevel, Side};
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "snapshot")]
    Snapshot(SnapshotFrame),

    #[serde(rename = "delta")]
    Delta(DeltaFrame),

    #[serde(rename = "subscribed")]
    Ack(AckFrame),

    #[serde(rename = "error")]
    Error(ErrorFrame),

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct SnapshotFrame {
    symbol: String,
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DeltaFrame {
    symbol: String,
    #[serde(default)]
    changes: Vec<RawChange>,
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AckFrame {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorFrame {
    symbol: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLevel {
    price: String,
    size: String,
}

impl RawLevel {
    fn price_decimal(&self) -> Option<Decimal> {
        self.price.parse().ok()
    }

    fn size_decimal(&self) -> Option<Decimal> {
        self.size.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawChange {
    side: String,
    price: String,
    size: String,
}

fn normalize_levels(raw: &[RawLevel]) -> Vec<PriceLevel> {
    raw.iter()
        .filter_map(|level| {
            let price = level.price_decimal();
            let size = level.size_decimal();
            match (price, size) {
                (Some(price), Some(size)) => Some(PriceLevel::new(price, size)),
                _ => {
                    warn!(price = %level.price, size = %level.size, "Skipping unparsable level");
                    None
                }
            }
        })
        .collect()
}

fn normalize_side(raw: &str) -> Option<Side> {
    match raw {
        "buy" | "bid" => Some(Side::Bid),
        "sell" | "ask" => Some(Side::Ask),
        _ => None,
    }
}

fn normalize_changes(raw: &[RawChange]) -> Vec<(Side, Decimal, Decimal)> {
    raw.iter()
        .filter_map(|change| {
            let side = normalize_side(&change.side);
            let price = change.price.parse().ok();
            let size = change.size.parse().ok();
            match (side, price, size) {
                (Some(side), Some(price), Some(size)) => Some((side, price, size)),
                _ => {
                    warn!(side = %change.side, price = %change.price, "Skipping unparsable change");
                    None
                }
            }
        })
        .collect()
}

fn normalize_timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Decode one raw frame into an [`Envelope`].
///
/// # Errors
///
/// Returns a JSON error when the text is not valid JSON at all; an
/// unrecognized type tag decodes as [`Envelope::Unknown`] instead.
pub fn decode(text: &str) -> Result<Envelope> {
    let message: WireMessage = serde_json::from_str(text)?;

    Ok(match message {
        WireMessage::Snapshot(frame) => Envelope::Snapshot {
            venue_id: frame.symbol,
            bids: normalize_levels(&frame.bids),
            asks: normalize_levels(&frame.asks),
            timestamp: normalize_timestamp(frame.timestamp),
        },
        WireMessage::Delta(frame) => Envelope::Delta {
            venue_id: frame.symbol,
            changes: normalize_changes(&frame.changes),
            timestamp: normalize_timestamp(frame.timestamp),
        },
        WireMessage::Ack(frame) => Envelope::Ack {
            venue_id: frame.symbol,
        },
        WireMessage::Error(frame) => Envelope::VenueError {
            venue_id: frame.symbol,
            message: frame.message,
        },
        WireMessage::Unknown => Envelope::Unknown,
    })
}
