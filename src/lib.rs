//! STOMP client over message-based transports such as WebSockets.
//!
//! [`StompClient`] drives one STOMP session: it opens a [`Transport`],
//! performs the CONNECT/CONNECTED handshake, pings on a heartbeat timer and
//! can reopen the session on a reconnect timer. Inbound frames and session
//! changes are delivered as [`StompEvent`]s on a single [`EventStream`].
//!
//! With the `websocket` feature, [`WebSocketTransport`] provides a transport
//! built on `tokio-tungstenite`.

pub mod client;
pub mod codec;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod header;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod timer;
pub mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::{ClientConfig, EventStream, StompClient};
pub use codec::{decode_frame, encode_frame};
pub use command::{AckMode, Command, ResponseCommand};
pub use dispatcher::{StompEvent, dispatch};
pub use error::{StompError, TransportError};
pub use frame::Frame;
pub use header::{HeaderKey, Headers};
pub use heartbeat::HeartbeatConfig;
pub use reconnect::{ReconnectMode, ReconnectPolicy};
pub use session::SessionState;
pub use timer::{MIN_REPEAT_INTERVAL, Scheduler, TimerHandle, TokioScheduler};
pub use transport::{ConnectRequest, Transport, TransportEvent, TransportSink};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
