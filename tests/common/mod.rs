//! Scripted transport for driving a `StompClient` from tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use stomp_socket::{
    ClientConfig, ConnectRequest, EventStream, HeartbeatConfig, StompClient, StompEvent, Transport,
    TransportError, TransportEvent, TransportSink,
};
use tokio::sync::mpsc;

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(60);

/// What the session did to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Binary(Bytes),
    Ping,
    Disconnect,
}

#[derive(Default)]
struct MockState {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    // kept after disconnect so tests can play late events
    sink: Mutex<Option<TransportSink>>,
    request: Mutex<Option<ConnectRequest>>,
}

/// The transport handed to the client.
struct MockTransport {
    state: Arc<MockState>,
    sent: mpsc::UnboundedSender<Sent>,
}

impl Transport for MockTransport {
    fn connect(&self, request: &ConnectRequest, sink: TransportSink) -> Result<(), TransportError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Io("connection refused".into()));
        }
        *self.state.request.lock().unwrap() = Some(request.clone());
        *self.state.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        let _ = self.sent.send(Sent::Disconnect);
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let _ = self.sent.send(Sent::Text(text));
        Ok(())
    }

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        let _ = self.sent.send(Sent::Binary(data));
        Ok(())
    }

    fn ping(&self) -> Result<(), TransportError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let _ = self.sent.send(Sent::Ping);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }
}

/// Test side of one transport the client created.
pub struct MockHandle {
    state: Arc<MockState>,
    sent: mpsc::UnboundedReceiver<Sent>,
}

impl MockHandle {
    /// The request the session connected with.
    pub fn request(&self) -> Option<ConnectRequest> {
        self.state.request.lock().unwrap().clone()
    }

    pub fn deliver(&self, event: TransportEvent) {
        let sink = self.state.sink.lock().unwrap().clone().expect("connect was called");
        sink.deliver(event);
    }

    /// Mark the transport open and report it.
    pub fn open(&self) {
        self.state.connected.store(true, Ordering::SeqCst);
        self.deliver(TransportEvent::Connected);
    }

    /// Push one inbound text payload.
    pub fn push(&self, payload: &str) {
        self.deliver(TransportEvent::Text(payload.to_string()));
    }

    /// The peer closes the connection.
    pub fn close(&self, code: u16) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.deliver(TransportEvent::Disconnected { code, reason: None });
    }

    /// Stop accepting sends without telling the session.
    pub fn go_quiet(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }

    pub fn fail(&self, cause: &str) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.deliver(TransportEvent::Error(cause.to_string()));
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub async fn next_sent(&mut self) -> Sent {
        tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for transport activity")
            .expect("transport dropped")
    }

    /// Next text payload, skipping pings.
    pub async fn next_text(&mut self) -> String {
        loop {
            match self.next_sent().await {
                Sent::Text(text) => return text,
                Sent::Ping => continue,
                other => panic!("expected text, got {:?}", other),
            }
        }
    }

    pub async fn next_frame(&mut self) -> ClientFrame {
        ClientFrame::parse(&self.next_text().await)
    }

    pub fn try_sent(&mut self) -> Option<Sent> {
        self.sent.try_recv().ok()
    }
}

/// A frame the client wrote, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ClientFrame {
    pub fn parse(payload: &str) -> Self {
        let payload = payload.strip_suffix('\0').expect("frame ends with NUL");
        let (head, body) = payload.split_once("\n\n").expect("blank line after headers");
        let mut lines = head.split('\n');
        let command = lines.next().unwrap_or_default().to_string();
        let headers = lines
            .map(|l| {
                let (k, v) = l.split_once(':').expect("header line has a colon");
                (k.to_string(), v.to_string())
            })
            .collect();
        Self {
            command,
            headers,
            body: body.to_string(),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A client wired to mock transports.
pub struct Harness {
    pub client: StompClient,
    pub events: EventStream,
    transports: mpsc::UnboundedReceiver<MockHandle>,
    fail_connect: Arc<AtomicBool>,
}

impl Harness {
    /// Heartbeats off so no pings interleave with the traffic under test.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new().with_heartbeat(HeartbeatConfig::disabled()))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let (tx, transports) = mpsc::unbounded_channel();
        let fail_connect = Arc::new(AtomicBool::new(false));
        let fail = fail_connect.clone();
        let client = StompClient::with_config(
            move || {
                let state = Arc::new(MockState::default());
                state
                    .fail_connect
                    .store(fail.load(Ordering::SeqCst), Ordering::SeqCst);
                let (sent_tx, sent_rx) = mpsc::unbounded_channel();
                let _ = tx.send(MockHandle {
                    state: state.clone(),
                    sent: sent_rx,
                });
                MockTransport {
                    state,
                    sent: sent_tx,
                }
            },
            config,
        );
        let events = client.events();
        Self {
            client,
            events,
            transports,
            fail_connect,
        }
    }

    /// Make subsequently created transports refuse to connect.
    pub fn refuse_connects(&self, refuse: bool) {
        self.fail_connect.store(refuse, Ordering::SeqCst);
    }

    pub async fn next_transport(&mut self) -> MockHandle {
        tokio::time::timeout(WAIT, self.transports.recv())
            .await
            .expect("timed out waiting for a transport")
            .expect("client dropped its factory")
    }

    pub fn try_transport(&mut self) -> Option<MockHandle> {
        self.transports.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> StompEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream ended")
    }

    /// Open, complete the handshake and return the live transport.
    pub async fn establish(&mut self, session: &str) -> MockHandle {
        self.client
            .open(ConnectRequest::new("ws://broker/ws"), None)
            .expect("open");
        let mut transport = self.next_transport().await;
        transport.open();
        let connect = transport.next_frame().await;
        assert_eq!(connect.command, "CONNECT");
        transport.push(&format!("CONNECTED\nversion:1.2\nsession:{}\n\n\0", session));
        assert_eq!(
            self.next_event().await,
            StompEvent::Connected {
                session_id: Some(session.to_string())
            }
        );
        transport
    }
}

/// Let the session task drain its inbox. Paused time only advances once
/// every task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
