//! The session task: one STOMP session over one transport at a time.
//!
//! All session state lives in a single task. Facade calls, transport events
//! and timer ticks arrive as [`Input`]s on one channel and are handled one at
//! a time, so no two of them ever interleave. After each input the task
//! publishes a [`Snapshot`] that the facade reads synchronously.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, trace, warn};
use tracing::instrument::WithSubscriber;

use crate::codec::{decode_frame, encode_frame};
use crate::command::Command;
use crate::dispatcher::{StompEvent, dispatch};
use crate::frame::Frame;
use crate::header::{ACCEPT_VERSION, HeaderKey, Headers};
use crate::heartbeat::{HeartbeatConfig, HeartbeatController};
use crate::reconnect::{ReconnectController, ReconnectPolicy, ReconnectTarget};
use crate::timer::{Scheduler, TimerId, TimerSlot};
use crate::transport::{ConnectRequest, Transport, TransportEvent, TransportSink};

/// Builds a fresh transport for every connect attempt.
pub(crate) type TransportFactory = Box<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport.
    #[default]
    Idle,
    /// Transport connect issued, waiting for it to open.
    Connecting,
    /// Transport open and CONNECT sent, waiting for CONNECTED.
    AwaitingHandshake,
    /// CONNECTED received.
    Established,
    /// DISCONNECT sent, tearing the transport down.
    Closing,
}

/// Everything the session task reacts to.
pub(crate) enum Input {
    Request(Request),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    HeartbeatTick(TimerId),
    ReconnectFire(TimerId),
    AutoDisconnectFire(TimerId),
}

/// Operations requested through the facade.
pub(crate) enum Request {
    Open {
        request: ConnectRequest,
        connection_headers: Headers,
    },
    Transmit(Frame),
    Disconnect,
    ConfigureHeartbeat(HeartbeatConfig),
    StartReconnect {
        target: ReconnectTarget,
        policy: ReconnectPolicy,
    },
    StopReconnect,
    AutoDisconnect(Duration),
    SetListener(mpsc::UnboundedSender<StompEvent>),
}

/// Session state as last published by the task.
#[derive(Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) state: SessionState,
    pub(crate) session_id: Option<String>,
    pub(crate) heartbeat_running: bool,
    pub(crate) reconnect_running: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl Snapshot {
    pub(crate) fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }
}

#[derive(Default)]
pub(crate) struct Shared {
    snapshot: Mutex<Snapshot>,
}

impl Shared {
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, snapshot: Snapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// Parts of the client configuration the task needs.
pub(crate) struct SessionConfig {
    pub(crate) heartbeat: HeartbeatConfig,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) dispatch: Option<tracing::Dispatch>,
}

pub(crate) struct Session {
    factory: TransportFactory,
    scheduler: Arc<dyn Scheduler>,
    inbox: mpsc::WeakUnboundedSender<Input>,
    shared: Arc<Shared>,

    state: SessionState,
    generation: u64,
    transport: Option<Arc<dyn Transport>>,
    session_id: Option<String>,
    request: Option<ConnectRequest>,
    connection_headers: Headers,

    heartbeat: HeartbeatController,
    reconnect: ReconnectController,
    auto_disconnect: TimerSlot,
    listener: Option<mpsc::UnboundedSender<StompEvent>>,
}

impl Session {
    /// Spawn the session task. Must be called from within a tokio runtime.
    ///
    /// Returns the task's inbox and the published state. The task ends once
    /// every clone of the returned sender has been dropped.
    pub(crate) fn spawn(
        factory: TransportFactory,
        config: SessionConfig,
    ) -> (mpsc::UnboundedSender<Input>, Arc<Shared>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let session = Session {
            factory,
            scheduler: config.scheduler,
            inbox: tx.downgrade(),
            shared: shared.clone(),
            state: SessionState::Idle,
            generation: 0,
            transport: None,
            session_id: None,
            request: None,
            connection_headers: Headers::new(),
            heartbeat: HeartbeatController::new(config.heartbeat),
            reconnect: ReconnectController::default(),
            auto_disconnect: TimerSlot::default(),
            listener: None,
        };

        let dispatch = config
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(|d| d.clone()));
        let span = tracing::dispatcher::with_default(&dispatch, || {
            tracing::info_span!("stomp_session")
        });
        tokio::spawn(session.run(rx).instrument(span).with_subscriber(dispatch));

        (tx, shared)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        debug!("session task started");
        while let Some(input) = rx.recv().await {
            self.handle(input);
        }
        self.shutdown();
        debug!("session task finished");
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Request(request) => self.handle_request(request),
            Input::Transport { generation, event } => self.handle_transport(generation, event),
            Input::HeartbeatTick(id) => self.heartbeat_tick(id),
            Input::ReconnectFire(id) => self.reconnect_fire(id),
            Input::AutoDisconnectFire(id) => {
                if self.auto_disconnect.is_current(id) {
                    self.auto_disconnect.disarm();
                    info!("auto-disconnect timer fired");
                    self.disconnect();
                }
            }
        }
        self.publish();
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Open {
                request,
                connection_headers,
            } => {
                self.request = Some(request);
                self.connection_headers = connection_headers;
                self.open_transport();
            }
            Request::Transmit(frame) => self.transmit(frame),
            Request::Disconnect => self.disconnect(),
            Request::ConfigureHeartbeat(config) => {
                debug!(previous = ?self.heartbeat.config(), ?config, "heartbeat reconfigured");
                self.heartbeat.configure(config);
            }
            Request::StartReconnect { target, policy } => {
                let on_fire = poster(self.inbox.clone(), Input::ReconnectFire);
                self.reconnect
                    .start(self.scheduler.as_ref(), target, policy, on_fire);
            }
            Request::StopReconnect => self.reconnect.stop(),
            Request::AutoDisconnect(after) => {
                let on_fire = poster(self.inbox.clone(), Input::AutoDisconnectFire);
                self.auto_disconnect
                    .arm_once(self.scheduler.as_ref(), after, on_fire);
                debug!(?after, "auto-disconnect armed");
            }
            Request::SetListener(listener) => {
                if self.listener.replace(listener).is_some() {
                    debug!("event listener replaced");
                }
            }
        }
    }

    /// Replace any live transport with a fresh one and start connecting it.
    fn open_transport(&mut self) {
        let Some(request) = self.request.clone() else {
            warn!("open requested without a connect request");
            return;
        };

        self.heartbeat.stop();
        self.teardown_transport();

        self.generation += 1;
        self.session_id = None;
        self.state = SessionState::Connecting;

        let transport = (self.factory)();
        let sink = TransportSink::new(self.generation, self.inbox.clone());
        info!(url = %request.url, generation = self.generation, "opening transport");
        match transport.connect(&request, sink) {
            Ok(()) => self.transport = Some(transport),
            Err(e) => {
                warn!(error = %e, "transport connect failed");
                transport.disconnect();
                self.fail(e.to_string());
            }
        }
    }

    fn teardown_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            debug!(generation = self.generation, "tearing down transport");
            transport.disconnect();
        }
    }

    fn handle_transport(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation || self.transport.is_none() {
            trace!(generation, current = self.generation, "ignoring event from stale transport");
            return;
        }

        match event {
            TransportEvent::Connected => {
                info!("transport connected");
                self.state = SessionState::AwaitingHandshake;
                let on_tick = poster(self.inbox.clone(), Input::HeartbeatTick);
                self.heartbeat.on_connected(self.scheduler.as_ref(), on_tick);
                self.send_connect_frame();
            }
            TransportEvent::Disconnected { code, reason } => {
                info!(code, reason = reason.as_deref().unwrap_or(""), "transport disconnected");
                self.heartbeat.stop();
                self.teardown_transport();
                self.session_id = None;
                self.state = SessionState::Idle;
                self.emit(StompEvent::Disconnected);
            }
            TransportEvent::Text(payload) => self.receive(&payload),
            TransportEvent::Binary(data) => match std::str::from_utf8(&data) {
                Ok(payload) => self.receive(payload),
                Err(_) => debug!(bytes = data.len(), "dropping non-utf8 binary payload"),
            },
            TransportEvent::Error(cause) => {
                warn!(%cause, "transport error");
                self.fail(cause);
            }
        }
    }

    /// Abnormal end of the session.
    fn fail(&mut self, description: String) {
        self.heartbeat.stop();
        self.teardown_transport();
        self.session_id = None;
        self.state = SessionState::Idle;
        self.emit(StompEvent::Error {
            description,
            detail: None,
        });
    }

    fn send_connect_frame(&mut self) {
        self.connection_headers
            .insert(HeaderKey::AcceptVersion, ACCEPT_VERSION);
        let frame = Frame::new(Command::Connect).headers(self.connection_headers.clone());
        self.transmit(frame);
    }

    fn receive(&mut self, payload: &str) {
        let Some(frame) = decode_frame(payload) else {
            trace!(bytes = payload.len(), "payload carries no known frame");
            return;
        };
        debug!(command = %frame.command, headers = frame.headers.len(), "frame received");

        let Some(event) = dispatch(frame) else {
            debug!("frame produced no event");
            return;
        };

        if let StompEvent::Connected { session_id } = &event {
            self.session_id = session_id.clone();
            if self.state == SessionState::AwaitingHandshake {
                self.state = SessionState::Established;
                info!(session = self.session_id.as_deref().unwrap_or(""), "session established");
            }
        }
        self.emit(event);
    }

    fn transmit(&mut self, frame: Frame) {
        let Some(transport) = &self.transport else {
            warn!(command = %frame.command, "no transport, frame dropped");
            return;
        };
        let payload = encode_frame(&frame);
        debug!(command = %frame.command, bytes = payload.len(), "sending frame");
        if let Err(e) = transport.send_text(payload) {
            warn!(command = %frame.command, error = %e, "send failed");
        }
    }

    fn disconnect(&mut self) {
        self.heartbeat.stop();
        self.auto_disconnect.disarm();
        if self.transport.is_some() {
            self.state = SessionState::Closing;
            let frame = Frame::new(Command::Disconnect)
                .header(HeaderKey::Disconnect, unix_timestamp().to_string());
            self.transmit(frame);
            self.teardown_transport();
        }
        self.session_id = None;
        self.state = SessionState::Idle;
        info!("session disconnected");
        self.emit(StompEvent::Disconnected);
    }

    fn heartbeat_tick(&mut self, id: TimerId) {
        if !self.heartbeat.accepts(id) {
            trace!(?id, "stale heartbeat tick");
            return;
        }
        let Some(transport) = &self.transport else {
            return;
        };
        match transport.ping() {
            Ok(()) => {
                trace!("ping sent");
                self.emit(StompEvent::SentPing);
            }
            Err(e) => warn!(error = %e, "ping failed"),
        }
    }

    fn reconnect_fire(&mut self, id: TimerId) {
        let connected = self.is_connected();
        if let Some(target) = self.reconnect.on_fire(id, connected) {
            info!(url = %target.request.url, connected, "reconnecting");
            self.request = Some(target.request);
            self.connection_headers = target.connection_headers;
            self.open_transport();
        }
    }

    fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    fn emit(&mut self, event: StompEvent) {
        match &self.listener {
            Some(listener) => {
                if listener.send(event).is_err() {
                    debug!("event listener dropped");
                    self.listener = None;
                }
            }
            None => trace!(?event, "no event listener"),
        }
    }

    fn publish(&self) {
        self.shared.store(Snapshot {
            state: self.state,
            session_id: self.session_id.clone(),
            heartbeat_running: self.heartbeat.is_running(),
            reconnect_running: self.reconnect.is_running(),
            transport: self.transport.clone(),
        });
    }

    fn shutdown(&mut self) {
        self.heartbeat.stop();
        self.reconnect.stop();
        self.auto_disconnect.disarm();
        self.teardown_transport();
        self.session_id = None;
        self.state = SessionState::Idle;
        self.publish();
    }
}

/// Timer callback that posts `make(id)` back into the session task.
fn poster(
    inbox: mpsc::WeakUnboundedSender<Input>,
    make: fn(TimerId) -> Input,
) -> impl Fn(TimerId) + Send + 'static {
    move |id| {
        if let Some(tx) = inbox.upgrade() {
            let _ = tx.send(make(id));
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
