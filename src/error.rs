use thiserror::Error;

/// Errors returned by [`StompClient`](crate::StompClient) operations.
///
/// These only describe whether an operation was accepted. What the broker or
/// the transport did with it is reported on the event stream.
#[derive(Error, Debug)]
pub enum StompError {
    /// The session task has shut down
    #[error("client closed: the session task is no longer running")]
    Closed,
}

/// Errors reported by a [`Transport`](crate::Transport) implementation.
///
/// The session logs these. A failed `connect` also becomes an
/// [`StompEvent::Error`](crate::StompEvent::Error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has no open connection
    #[error("transport is not connected")]
    NotConnected,
    /// The connect request could not be turned into a handshake
    #[error("invalid connect request: {0}")]
    InvalidRequest(String),
    /// I/O or protocol failure underneath the transport
    #[error("io error: {0}")]
    Io(String),
}
