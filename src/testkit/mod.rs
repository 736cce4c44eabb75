//! Mock [`Transport`] implementations for testing.
//!
//! [`ChannelTransport`] is a channel-backed transport with an external
//! control handle: tests push envelopes or raw frame text in, observe the
//! control frames the client sent, and signal close on demand. No real
//! network I/O.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::codec;
use crate::domain::Envelope;
use crate::error::Result;
use crate::port::{Transport, TransportEvent};

/// A mock transport controlled externally via a [`ChannelTransportHandle`].
pub struct ChannelTransport {
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    connect_count: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<String>>>,
}

/// Control handle for a [`ChannelTransport`].
pub struct ChannelTransportHandle {
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    connect_count: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ChannelTransportHandle {
    /// Deliver a decoded envelope to the client.
    pub fn send_envelope(&self, envelope: Envelope) {
        let _ = self.event_tx.send(TransportEvent::Envelope(envelope));
    }

    /// Deliver raw frame text, decoding it through the wire codec.
    ///
    /// # Panics
    ///
    /// Panics on invalid frame text; test frames are expected to be valid.
    pub fn send_frame(&self, text: &str) {
        let envelope = codec::decode(text).expect("test frame must decode");
        self.send_envelope(envelope);
    }

    /// Signal a connection close with the given reason.
    pub fn close(&self, reason: &str) {
        let _ = self.event_tx.send(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    /// How many times `connect()` was called.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// All control frames the client sent, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames whose JSON `type` field matches `tag`.
    pub fn sent_frames_of_type(&self, tag: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|frame| {
                serde_json::from_str::<serde_json::Value>(frame)
                    .ok()
                    .is_some_and(|v| v["type"] == tag)
            })
            .cloned()
            .collect()
    }
}

/// Create a [`ChannelTransport`] and its control [`ChannelTransportHandle`].
pub fn channel_transport() -> (ChannelTransport, ChannelTransportHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connect_count = Arc::new(AtomicU32::new(0));
    let sent = Arc::new(Mutex::new(Vec::new()));
    (
        ChannelTransport {
            event_rx: rx,
            connect_count: connect_count.clone(),
            sent: sent.clone(),
        },
        ChannelTransportHandle {
            event_tx: tx,
            connect_count,
            sent,
        },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<()> {
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A mock transport with a fixed, pre-scripted event queue.
///
/// Events are returned in order; an exhausted queue ends the stream.
pub struct ScriptedTransport {
    events: VecDeque<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events: events.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the control frames sent so far.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<()> {
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
