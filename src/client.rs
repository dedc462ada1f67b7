use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use crate::command::{AckMode, Command};
use crate::dispatcher::StompEvent;
use crate::error::StompError;
use crate::frame::Frame;
use crate::header::{HeaderKey, Headers};
use crate::heartbeat::HeartbeatConfig;
use crate::reconnect::{ReconnectPolicy, ReconnectTarget};
use crate::session::{Input, Request, Session, SessionConfig, SessionState, Shared};
use crate::timer::{Scheduler, TokioScheduler};
use crate::transport::{ConnectRequest, Transport};

/// Default `content-type` for [`StompClient::send`].
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Options for building a [`StompClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Heartbeat ping settings.
    pub heartbeat: HeartbeatConfig,
    /// Timer source for heartbeat, reconnect and auto-disconnect.
    pub scheduler: Arc<dyn Scheduler>,
    /// Logger for the session task. `None` inherits the dispatcher that is
    /// current when the client is built.
    pub dispatch: Option<tracing::Dispatch>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            scheduler: Arc::new(TokioScheduler),
            dispatch: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Route the session's diagnostics to `dispatch` instead of the ambient
    /// subscriber.
    pub fn with_dispatch(mut self, dispatch: impl Into<tracing::Dispatch>) -> Self {
        self.dispatch = Some(dispatch.into());
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("heartbeat", &self.heartbeat)
            .field("dispatch", &self.dispatch.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to a STOMP session over a message transport.
///
/// The client spawns a background task that owns the session: the transport,
/// the handshake state, the heartbeat and reconnect timers. Every operation
/// here builds a frame or a request, queues it for that task and returns
/// immediately. `Ok(())` means "accepted"; what happened afterwards is
/// reported on the [`EventStream`] returned by [`StompClient::events`].
///
/// Handles are cheap to clone. The task stops, disconnecting the transport
/// and cancelling timers, when the last handle is dropped.
#[derive(Clone)]
pub struct StompClient {
    inbox: mpsc::UnboundedSender<Input>,
    shared: Arc<Shared>,
}

impl StompClient {
    /// Create a client with the default configuration.
    ///
    /// `factory` builds a new transport for every connect attempt.
    /// Must be called from within a tokio runtime.
    pub fn new<F, T>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transport,
    {
        Self::with_config(factory, ClientConfig::default())
    }

    /// Create a client with an explicit configuration.
    pub fn with_config<F, T>(factory: F, config: ClientConfig) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transport,
    {
        let factory = Box::new(move || Arc::new(factory()) as Arc<dyn Transport>);
        let (inbox, shared) = Session::spawn(
            factory,
            SessionConfig {
                heartbeat: config.heartbeat,
                scheduler: config.scheduler,
                dispatch: config.dispatch,
            },
        );
        Self { inbox, shared }
    }

    /// Register the event listener and return its stream.
    ///
    /// There is one listener per client: registering again closes the
    /// previous stream. Events emitted before registration are not replayed,
    /// so register before [`StompClient::open`].
    pub fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        // a closed inbox just yields a stream that ends immediately
        let _ = self.request(Request::SetListener(tx));
        EventStream { rx }
    }

    /// Open the transport and start the STOMP handshake.
    ///
    /// Parameters
    /// - `request`: transport endpoint and handshake headers.
    /// - `connection_headers`: headers for the CONNECT frame (e.g. `login`,
    ///   `passcode`, `host`). `accept-version` is always set to `1.1,1.2`.
    ///
    /// Any transport that is already open is torn down first.
    pub fn open(
        &self,
        request: ConnectRequest,
        connection_headers: Option<Headers>,
    ) -> Result<(), StompError> {
        self.request(Request::Open {
            request,
            connection_headers: connection_headers.unwrap_or_default(),
        })
    }

    /// Whether the current transport reports an open connection.
    pub fn is_connected(&self) -> bool {
        self.shared.snapshot().is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshot().state
    }

    /// The `session` header of the last CONNECTED frame of the live session.
    pub fn session_id(&self) -> Option<String> {
        self.shared.snapshot().session_id
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.shared.snapshot().heartbeat_running
    }

    pub fn is_reconnect_running(&self) -> bool {
        self.shared.snapshot().reconnect_running
    }

    /// Change heartbeat settings. New settings apply at the next transport
    /// connect; disabling stops a running ticker right away.
    pub fn configure_heartbeat(&self, heartbeat: HeartbeatConfig) -> Result<(), StompError> {
        self.request(Request::ConfigureHeartbeat(heartbeat))
    }

    /// Send a text message to `destination`.
    ///
    /// Parameters
    /// - `message`: body text. `content-length` is set to its UTF-8 length.
    /// - `destination`: broker destination, overrides any `destination` in
    ///   `headers`.
    /// - `headers`: extra headers. `content-type` defaults to `text/plain`.
    /// - `receipt`: if set, the broker confirms with a
    ///   [`StompEvent::Receipt`] carrying this id.
    pub fn send(
        &self,
        message: &str,
        destination: &str,
        headers: Option<Headers>,
        receipt: Option<&str>,
    ) -> Result<(), StompError> {
        self.send_frame(message_frame(message, destination, headers, receipt))
    }

    /// Queue an arbitrary frame for transmission.
    pub fn send_frame(&self, frame: Frame) -> Result<(), StompError> {
        self.request(Request::Transmit(frame))
    }

    /// Subscribe to `destination` with `auto` acknowledgement.
    pub fn subscribe(&self, destination: &str) -> Result<(), StompError> {
        self.subscribe_to_destination(destination, AckMode::Auto)
    }

    /// Subscribe to `destination` with the given ack mode. The subscription
    /// id is the destination itself, which is what
    /// [`StompClient::unsubscribe`] sends back.
    pub fn subscribe_to_destination(&self, destination: &str, ack: AckMode) -> Result<(), StompError> {
        self.send_frame(subscribe_frame(destination, ack))
    }

    /// Subscribe with caller-chosen headers; only `destination` is set here.
    pub fn subscribe_with_headers(&self, destination: &str, headers: Headers) -> Result<(), StompError> {
        self.send_frame(
            Frame::new(Command::Subscribe)
                .headers(headers)
                .header(HeaderKey::Destination, destination),
        )
    }

    /// Unsubscribe the subscription whose id is `destination`.
    pub fn unsubscribe(&self, destination: &str) -> Result<(), StompError> {
        self.send_frame(Frame::new(Command::Unsubscribe).header(HeaderKey::Id, destination))
    }

    pub fn begin(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_frame(transaction_frame(Command::Begin, transaction_id))
    }

    pub fn commit(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_frame(transaction_frame(Command::Commit, transaction_id))
    }

    pub fn abort(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_frame(transaction_frame(Command::Abort, transaction_id))
    }

    /// Acknowledge a message by its `message-id`.
    pub fn ack(&self, message_id: &str) -> Result<(), StompError> {
        self.send_frame(Frame::new(Command::Ack).header(HeaderKey::Id, message_id))
    }

    /// Acknowledge a message, naming the subscription it arrived on.
    pub fn ack_with_subscription(&self, message_id: &str, subscription: &str) -> Result<(), StompError> {
        self.send_frame(
            Frame::new(Command::Ack)
                .header(HeaderKey::Id, message_id)
                .header(HeaderKey::Subscription, subscription),
        )
    }

    /// Send DISCONNECT and close the transport.
    ///
    /// Stops the heartbeat and emits [`StompEvent::Disconnected`]. A running
    /// reconnect timer is left alone; call [`StompClient::stop_reconnect`]
    /// to keep the session down.
    pub fn disconnect(&self) -> Result<(), StompError> {
        self.request(Request::Disconnect)
    }

    /// Start reopening the session with `request` and `connection_headers`
    /// according to `policy`. Replaces any previous reconnect setup.
    pub fn reconnect(
        &self,
        request: ConnectRequest,
        connection_headers: Headers,
        policy: ReconnectPolicy,
    ) -> Result<(), StompError> {
        self.request(Request::StartReconnect {
            target: ReconnectTarget {
                request,
                connection_headers,
            },
            policy,
        })
    }

    /// Cancel the reconnect timer. Idempotent.
    pub fn stop_reconnect(&self) -> Result<(), StompError> {
        self.request(Request::StopReconnect)
    }

    /// Disconnect once `after` has elapsed. Calling again replaces the
    /// pending timer; an explicit disconnect cancels it.
    pub fn auto_disconnect(&self, after: Duration) -> Result<(), StompError> {
        self.request(Request::AutoDisconnect(after))
    }

    fn request(&self, request: Request) -> Result<(), StompError> {
        self.inbox
            .send(Input::Request(request))
            .map_err(|_| StompError::Closed)
    }
}

impl fmt::Debug for StompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.shared.snapshot();
        f.debug_struct("StompClient")
            .field("state", &snapshot.state)
            .field("session_id", &snapshot.session_id)
            .finish()
    }
}

/// Single-consumer stream of [`StompEvent`]s.
///
/// Ends when another listener is registered or the client task stops.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StompEvent>,
}

impl EventStream {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<StompEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<StompEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = StompEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

fn message_frame(message: &str, destination: &str, headers: Option<Headers>, receipt: Option<&str>) -> Frame {
    let mut headers = headers.unwrap_or_default();
    if let Some(receipt) = receipt {
        headers.insert(HeaderKey::Receipt, receipt);
    }
    headers.insert(HeaderKey::Destination, destination);
    headers.insert(HeaderKey::ContentLength, message.len().to_string());
    headers.insert_if_absent(HeaderKey::ContentType, DEFAULT_CONTENT_TYPE);
    Frame::new(Command::Send).headers(headers).set_body(message)
}

fn subscribe_frame(destination: &str, ack: AckMode) -> Frame {
    Frame::new(Command::Subscribe)
        .header(HeaderKey::Destination, destination)
        .header(HeaderKey::Ack, ack.as_str())
        .header(HeaderKey::Id, destination)
}

fn transaction_frame(command: Command, transaction_id: &str) -> Frame {
    Frame::new(command).header(HeaderKey::Transaction, transaction_id)
}
