//! The capability the session needs from a message transport.
//!
//! A transport moves whole text or binary messages (a WebSocket, typically)
//! and reports what happens on the connection through a [`TransportSink`].
//! All methods return immediately; completion is reported as events.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::header::Headers;
use crate::session::Input;

/// Where and how a transport should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Endpoint URL, e.g. `ws://localhost:15674/ws`.
    pub url: String,
    /// Extra handshake headers for the transport (not STOMP headers).
    pub headers: Headers,
}

impl ConnectRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
        }
    }

    /// Add a handshake header (builder style).
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value);
        self
    }
}

/// What a transport reports about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { code: u16, reason: Option<String> },
    Text(String),
    Binary(Bytes),
    Error(String),
}

/// A message-based transport.
///
/// Implementations are shared behind an `Arc` so methods take `&self`; use
/// interior mutability for connection state. One instance serves one connect
/// attempt: the session builds a fresh one for every open.
pub trait Transport: Send + Sync + 'static {
    /// Start connecting. Outcome and traffic are reported through `sink`.
    fn connect(&self, request: &ConnectRequest, sink: TransportSink) -> Result<(), TransportError>;

    /// Close the connection and drop the sink. Must be idempotent.
    fn disconnect(&self);

    fn send_text(&self, text: String) -> Result<(), TransportError>;

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError>;

    /// Send a transport-level ping.
    fn ping(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Non-owning handle a transport uses to report events to its session.
///
/// The handle holds a weak reference: once the session is gone, deliveries
/// are discarded. Each handle is tagged with the connect attempt it was made
/// for, so events from a replaced transport never reach the new session.
#[derive(Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::WeakUnboundedSender<Input>,
}

impl TransportSink {
    pub(crate) fn new(generation: u64, tx: mpsc::WeakUnboundedSender<Input>) -> Self {
        Self { generation, tx }
    }

    /// Report an event. Returns `false` if the session no longer exists.
    pub fn deliver(&self, event: TransportEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(Input::Transport {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }

    /// The connect attempt this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSink")
            .field("generation", &self.generation)
            .finish()
    }
}
