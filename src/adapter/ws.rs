//! WebSocket transport.
//!
//! Wraps a tokio-tungstenite session behind the [`Transport`] port:
//! text frames are decoded into envelopes, pings are answered with pongs to
//! keep the connection alive, and close frames or stream errors surface as
//! a single `Closed` event. Parse failures are logged and skipped so one
//! malformed message never terminates the session.
//!
//! This transport does not reconnect by itself; retry policy belongs to the
//! caller.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, trace, warn};

use super::codec;
use crate::error::{Error, Result};
use crate::port::{Transport, TransportEvent};

/// A [`Transport`] over a WebSocket connection.
pub struct WsTransport {
    url: String,
    ws: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsTransport {
    /// Create a transport for the given WebSocket URL; call
    /// [`Transport::connect`] before use.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url, ws: None }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to WebSocket");
        let (ws_stream, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "WebSocket connected");
        self.ws = Some(ws_stream);
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Connection("not connected".into()))?;
        ws.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let ws = self.ws.as_mut()?;

        loop {
            match ws.next().await? {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    match codec::decode(&text) {
                        Ok(envelope) => return Some(TransportEvent::Envelope(envelope)),
                        Err(e) => {
                            warn!(error = %e, bytes = text.len(), "Failed to parse message");
                        }
                    }
                }
                Ok(Message::Ping(data)) => {
                    trace!("Received WebSocket ping");
                    if ws.send(Message::Pong(data)).await.is_err() {
                        return Some(TransportEvent::Closed {
                            reason: "failed to send pong".into(),
                        });
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    return Some(TransportEvent::Closed {
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                // Binary, pong and raw frames are ignored.
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    return Some(TransportEvent::Closed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let transport = WsTransport::new("wss://example.com/ws".into());
        assert!(transport.ws.is_none());
        assert_eq!(transport.name(), "websocket");
    }

    #[tokio::test]
    async fn send_before_connect_is_a_connection_error() {
        let mut transport = WsTransport::new("wss://example.com/ws".into());
        let err = transport.send("{}".into()).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn next_event_before_connect_is_none() {
        let mut transport = WsTransport::new("wss://example.com/ws".into());
        assert!(transport.next_event().await.is_none());
    }
}
