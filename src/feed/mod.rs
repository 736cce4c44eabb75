//! The live order-book synchronization engine.
//!
//! Four pieces, leaves first: the replica [`store`], the subscription
//! [`registry`] that owns it, the [`router`] that applies inbound frames,
//! and the [`client`] connection manager exposing `watch`/`unwatch`.

pub mod client;
pub mod registry;
pub mod router;
pub mod store;

pub use client::{message_hash, WatchClient};
pub use registry::{SubscribeAction, SubscriptionRegistry, SubscriptionState, Waiter};
pub use router::{FeedStats, Router};
pub use store::BookStore;
