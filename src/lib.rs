//! Bookwatch - live order-book synchronization over streaming venue feeds.
//!
//! Given a snapshot message followed by a stream of incremental deltas,
//! this crate reconstructs and continuously maintains a queryable in-memory
//! replica of a remote order book, correlates inbound frames to the logical
//! subscription and pending callers that triggered them, and delivers
//! consistent depth-limited views to multiple concurrent consumers.
//!
//! # Architecture
//!
//! - [`feed`] - The synchronization engine: replica store, subscription
//!   registry, frame router, and the [`feed::WatchClient`] connection
//!   manager exposing `watch`/`unwatch`.
//! - [`domain`] - Venue-agnostic types: symbols, sorted book sides,
//!   replicas and views, decoded envelopes.
//! - [`port`] - Integration seams: the [`port::Transport`] session and the
//!   [`port::ExchangeDescriptor`] venue mapping.
//! - [`adapter`] - A tokio-tungstenite WebSocket transport and the wire
//!   codec that normalizes string payloads into decimal levels.
//! - [`config`] - TOML configuration and logging setup.
//! - [`error`] - Error types for the crate.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bookwatch::adapter::WsTransport;
//! use bookwatch::domain::Symbol;
//! use bookwatch::feed::WatchClient;
//! use bookwatch::port::StaticDescriptor;
//!
//! # async fn example() -> bookwatch::error::Result<()> {
//! let symbol = Symbol::new("BTC/USD", "BTC-USD");
//! let descriptor = Arc::new(StaticDescriptor::new("level2", vec![symbol.clone()]));
//! let client = Arc::new(WatchClient::new(descriptor));
//!
//! let runner = client.clone();
//! tokio::spawn(async move {
//!     let transport = WsTransport::new("wss://ws-feed.example.com".into());
//!     let _ = runner.run(transport).await;
//! });
//!
//! let view = client.watch(&symbol, Some(10)).await?;
//! println!("best bid: {:?}", view.best_bid());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod port;

#[cfg(feature = "testkit")]
pub mod testkit;
