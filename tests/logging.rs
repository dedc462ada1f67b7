//! The session logs through the dispatcher it was given.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::Harness;
use stomp_socket::{ClientConfig, HeartbeatConfig, StompError, TransportError};
use tracing::span::{Attributes, Id, Record};
use tracing::{Dispatch, Event, Metadata, Subscriber};

#[derive(Clone, Default)]
struct Counting {
    events: Arc<AtomicUsize>,
    spans: Arc<AtomicUsize>,
}

impl Subscriber for Counting {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _: &Attributes<'_>) -> Id {
        Id::from_u64(self.spans.fetch_add(1, Ordering::SeqCst) as u64 + 1)
    }

    fn record(&self, _: &Id, _: &Record<'_>) {}

    fn record_follows_from(&self, _: &Id, _: &Id) {}

    fn event(&self, _: &Event<'_>) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }

    fn enter(&self, _: &Id) {}

    fn exit(&self, _: &Id) {}
}

#[tokio::test(start_paused = true)]
async fn session_logs_to_injected_dispatch() {
    let counting = Counting::default();
    let config = ClientConfig::new()
        .with_heartbeat(HeartbeatConfig::disabled())
        .with_dispatch(Dispatch::new(counting.clone()));
    let mut h = Harness::with_config(config);
    let _t = h.establish("s").await;

    assert!(counting.events.load(Ordering::SeqCst) > 0);
    assert!(counting.spans.load(Ordering::SeqCst) > 0, "session span created");
}

#[test]
fn error_messages() {
    assert_eq!(
        StompError::Closed.to_string(),
        "client closed: the session task is no longer running"
    );
    assert_eq!(
        TransportError::NotConnected.to_string(),
        "transport is not connected"
    );
    assert_eq!(
        TransportError::InvalidRequest("bad url".into()).to_string(),
        "invalid connect request: bad url"
    );
    assert_eq!(TransportError::Io("reset".into()).to_string(), "io error: reset");
}
