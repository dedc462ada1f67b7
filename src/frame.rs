use std::fmt;

use crate::command::ResponseCommand;
use crate::header::{HeaderKey, Headers};

/// A simple representation of a STOMP frame.
///
/// `Frame` contains the command (e.g. "SEND", "MESSAGE"), a header map with
/// unique keys and an optional text body. An absent body and an empty body are
/// different things: decoding a payload that never reaches the blank line
/// separator yields `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: String,
    /// Headers in wire order
    pub headers: Headers,
    /// Body text, if the frame carries one
    pub body: Option<String>,
}

impl Frame {
    /// Create a new frame with the given command and no headers or body.
    ///
    /// Parameters
    /// - `command`: the STOMP command name. Accepts a
    ///   [`Command`](crate::Command), a
    ///   [`ResponseCommand`](crate::ResponseCommand) or any string.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Set a header (builder style). An existing header with the same name is
    /// overwritten.
    pub fn header(mut self, key: impl Into<HeaderKey>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Merge a whole header map into the frame (builder style).
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request a receipt for this frame (builder style).
    ///
    /// The broker answers with a RECEIPT frame whose `receipt-id` equals `id`,
    /// surfaced as [`StompEvent::Receipt`](crate::StompEvent::Receipt).
    pub fn receipt(self, id: impl Into<String>) -> Self {
        self.header(HeaderKey::Receipt, id)
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The inbound command of this frame, if it is one the client understands.
    pub fn response_command(&self) -> Option<ResponseCommand> {
        self.command.parse().ok()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in self.headers.iter() {
            writeln!(f, "{}: {}", k, v)?;
        }
        match &self.body {
            Some(body) => writeln!(f, "Body ({} bytes)", body.len()),
            None => writeln!(f, "No body"),
        }
    }
}
