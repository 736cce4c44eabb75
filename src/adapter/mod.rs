//! Concrete adapters: the WebSocket transport and the wire codec.

pub mod codec;
pub mod ws;

pub use ws::WsTransport;
