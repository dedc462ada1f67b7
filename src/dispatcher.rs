use crate::command::ResponseCommand;
use crate::frame::Frame;
use crate::header::{self, HeaderKey, Headers};

/// Events delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompEvent {
    /// The broker answered CONNECT with CONNECTED.
    Connected {
        /// The `session` header of the CONNECTED frame, if the broker sent one.
        session_id: Option<String>,
    },
    /// The session ended, either on request or because the transport closed.
    Disconnected,
    /// A MESSAGE frame. `destination` is empty when the header is missing.
    Message {
        body: Option<String>,
        headers: Headers,
        destination: String,
    },
    /// The broker confirmed the frame sent with `receipt: receipt_id`.
    Receipt { receipt_id: String },
    /// A broker ERROR frame, or a transport failure (with no detail).
    Error {
        description: String,
        detail: Option<String>,
    },
    /// A heartbeat ping was handed to the transport. A tick whose ping the
    /// transport rejects emits nothing.
    SentPing,
}

/// Map a decoded inbound frame to the event the application sees.
///
/// Returns `None` for frames that must not produce an event: unknown
/// commands, RECEIPT without `receipt-id` and ERROR without `message`.
pub fn dispatch(frame: Frame) -> Option<StompEvent> {
    match frame.response_command()? {
        ResponseCommand::Connected => Some(StompEvent::Connected {
            session_id: frame.get_header(header::SESSION).map(str::to_string),
        }),
        ResponseCommand::Message => {
            let destination = frame
                .get_header(HeaderKey::Destination.as_str())
                .unwrap_or_default()
                .to_string();
            Some(StompEvent::Message {
                body: frame.body,
                headers: frame.headers,
                destination,
            })
        }
        ResponseCommand::Receipt => {
            let receipt_id = frame.get_header(header::RECEIPT_ID)?.to_string();
            Some(StompEvent::Receipt { receipt_id })
        }
        ResponseCommand::Error => {
            let description = frame.get_header(header::MESSAGE)?.to_string();
            Some(StompEvent::Error {
                description,
                detail: frame.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    fn dispatch_text(payload: &str) -> Option<StompEvent> {
        decode_frame(payload).and_then(dispatch)
    }

    #[test]
    fn connected_captures_session() {
        assert_eq!(
            dispatch_text("CONNECTED\nsession:abc123\n\n\0"),
            Some(StompEvent::Connected {
                session_id: Some("abc123".into())
            })
        );
        assert_eq!(
            dispatch_text("CONNECTED\nversion:1.2\n\n\0"),
            Some(StompEvent::Connected { session_id: None })
        );
    }

    #[test]
    fn message_without_destination_defaults_to_empty() {
        match dispatch_text("MESSAGE\nmessage-id:1\n\nhello\0") {
            Some(StompEvent::Message {
                body,
                headers,
                destination,
            }) => {
                assert_eq!(destination, "");
                assert_eq!(body.as_deref(), Some("hello"));
                assert_eq!(headers.get("message-id"), Some("1"));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn receipt_requires_receipt_id() {
        assert_eq!(dispatch_text("RECEIPT\n\n\0"), None);
        assert_eq!(
            dispatch_text("RECEIPT\nreceipt-id:r-9\n\n\0"),
            Some(StompEvent::Receipt {
                receipt_id: "r-9".into()
            })
        );
    }

    #[test]
    fn error_requires_message_header() {
        assert_eq!(dispatch_text("ERROR\n\nno header\0"), None);
        assert_eq!(
            dispatch_text("ERROR\nmessage:bad destination\n\ndetails here\0"),
            Some(StompEvent::Error {
                description: "bad destination".into(),
                detail: Some("details here".into()),
            })
        );
    }

    #[test]
    fn non_inbound_frames_are_ignored() {
        assert_eq!(dispatch(Frame::new("SEND")), None);
    }
}
