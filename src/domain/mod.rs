//! Venue-agnostic domain types: symbols, order books, decoded frames.

pub mod book;
pub mod envelope;
pub mod symbol;

pub use book::{BookSide, OrderBook, OrderBookView, PriceLevel, Side};
pub use envelope::Envelope;
pub use symbol::Symbol;
