use serde::Deserialize;

/// A tradeable instrument: a canonical name plus the venue-native id the
/// wire protocol uses for it.
///
/// The venue id is what appears in subscribe frames and inbound envelopes;
/// the canonical name is what callers and logs use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Symbol {
    name: String,
    venue_id: String,
}

impl Symbol {
    /// Create a new symbol.
    pub fn new(name: impl Into<String>, venue_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            venue_id: venue_id.into(),
        }
    }

    /// The canonical instrument name (e.g. `BTC/USD`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The venue-native id (e.g. `BTC-USD`).
    #[must_use]
    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
