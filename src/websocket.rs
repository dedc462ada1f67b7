//! [`Transport`] over a WebSocket, built on `tokio-tungstenite`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as WsRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::transport::{ConnectRequest, Transport, TransportEvent, TransportSink};

/// Close code reported when the peer closed without a status.
const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code reported when the stream ended without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// WebSocket transport. One instance handles one connection.
///
/// `connect` spawns a task that performs the handshake and then pumps
/// messages in both directions until the socket closes or
/// [`Transport::disconnect`] is called. STOMP payloads go out as text
/// messages.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    connected: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, message: Message) -> Result<(), TransportError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let outbound = self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        outbound
            .as_ref()
            .ok_or(TransportError::NotConnected)?
            .send(message)
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, request: &ConnectRequest, sink: TransportSink) -> Result<(), TransportError> {
        let ws_request = build_request(request)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        *self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        if let Some(previous) = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone())
        {
            previous.cancel();
        }

        debug!(url = %request.url, "websocket connecting");
        tokio::spawn(run_socket(ws_request, sink, rx, cancel, self.inner.clone()));
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(cancel) = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
        }
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.queue(Message::text(text))
    }

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.queue(Message::Binary(data))
    }

    fn ping(&self) -> Result<(), TransportError> {
        self.queue(Message::Ping(Bytes::new()))
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}

fn build_request(request: &ConnectRequest) -> Result<WsRequest, TransportError> {
    let mut ws_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    for (name, value) in request.headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("header {:?}: {}", name, e)))?;
        ws_request.headers_mut().insert(header_name, header_value);
    }
    Ok(ws_request)
}

async fn run_socket(
    request: WsRequest,
    sink: TransportSink,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
    inner: Arc<Inner>,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        result = tokio_tungstenite::connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!(error = %e, "websocket handshake failed");
                sink.deliver(TransportEvent::Error(e.to_string()));
                return;
            }
        },
    };

    inner.connected.store(true, Ordering::SeqCst);
    sink.deliver(TransportEvent::Connected);

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            // queued frames (DISCONNECT included) go out before the close
            biased;
            maybe = outbound.recv() => match maybe {
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        warn!(error = %e, "websocket send failed");
                        sink.deliver(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                let _ = write.close().await;
                break;
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    sink.deliver(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    sink.deliver(TransportEvent::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), Some(f.reason.as_str().to_owned())),
                        None => (NO_STATUS_RECEIVED, None),
                    };
                    debug!(code, "websocket closed by peer");
                    sink.deliver(TransportEvent::Disconnected { code, reason });
                    break;
                }
                Some(Ok(Message::Pong(_))) => trace!("pong received"),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    sink.deliver(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    sink.deliver(TransportEvent::Disconnected {
                        code: ABNORMAL_CLOSURE,
                        reason: None,
                    });
                    break;
                }
            },
        }
    }

    inner.connected.store(false, Ordering::SeqCst);
}
