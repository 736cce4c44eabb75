//! Transport port for the connection session.
//!
//! A [`Transport`] carries raw control frames out and decoded envelopes in.
//! Exactly one logical inbound stream exists per connection; the connection
//! manager consumes it strictly in arrival order.

use async_trait::async_trait;

use crate::domain::Envelope;
use crate::error::Result;

/// An inbound transport event.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A decoded frame, delivered in arrival order.
    Envelope(Envelope),
    /// The connection closed; no further envelopes will arrive.
    Closed { reason: String },
}

/// A bidirectional session with a venue feed.
#[async_trait]
pub trait Transport: Send {
    /// Establish the session.
    async fn connect(&mut self) -> Result<()>;

    /// Send one outbound control frame.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Receive the next inbound event. `None` means the stream has ended
    /// and is equivalent to a close without a reason.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
