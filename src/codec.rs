//! Text codec between [`Frame`]s and transport payloads.
//!
//! Each transport message carries at most one frame:
//!
//! ```text
//! COMMAND\n
//! name:value\n
//! ...
//! \n
//! [body]\0
//! ```
//!
//! Header names and values are written verbatim. There is no escaping of
//! `\n`, `:` or NUL, so values containing those characters cannot survive a
//! round trip.

use crate::command::ResponseCommand;
use crate::frame::Frame;
use crate::header::Headers;

/// Frame terminator.
pub const NUL: char = '\0';

/// A bare heartbeat payload. Decodes to no frame.
pub const HEARTBEAT: &str = "\n";

/// Encode a frame into the text payload handed to the transport.
///
/// Headers are written in the frame's header order, followed by the blank
/// separator line, the body (if any) and a single NUL terminator. A frame
/// without headers still gets the blank line.
pub fn encode_frame(frame: &Frame) -> String {
    let body_len = frame.body.as_ref().map_or(0, String::len);
    let mut out = String::with_capacity(frame.command.len() + 64 + body_len);

    out.push_str(&frame.command);
    out.push('\n');
    for (k, v) in frame.headers.iter() {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('\n');
    if let Some(body) = &frame.body {
        out.push_str(body);
    }
    out.push(NUL);
    out
}

/// Decode one transport payload into a frame.
///
/// Parameters
/// - `payload`: the complete text of one transport message.
///
/// Returns `Some(Frame)` when the first line names a [`ResponseCommand`] and
/// `None` otherwise. This never fails: heartbeats (`"\n"`), empty payloads
/// and garbage all come back as `None`.
///
/// Behaviour
/// - One leading empty line is discarded (some transports prefix one).
/// - Header lines are split on the first `:` only. A line without a colon
///   becomes a header with an empty value. A repeated header name keeps the
///   last value.
/// - Everything after the first empty line is the body, newlines included,
///   cut at the first NUL. A payload that never reaches the empty line has no
///   body.
pub fn decode_frame(payload: &str) -> Option<Frame> {
    let mut lines = payload.split('\n').peekable();
    if lines.peek() == Some(&"") {
        lines.next();
    }

    let command_line = lines.next()?;
    let command_line = command_line.strip_suffix('\r').unwrap_or(command_line);
    let command: ResponseCommand = command_line.parse().ok()?;

    let mut headers = Headers::new();
    let mut reached_body = false;
    for line in lines.by_ref() {
        if line.is_empty() {
            reached_body = true;
            break;
        }
        match line.split_once(NUL) {
            // terminator inside the header block: the frame ends here
            Some((before, _)) => {
                if !before.is_empty() {
                    insert_header_line(&mut headers, before);
                }
                return Some(Frame {
                    command: command.into(),
                    headers,
                    body: None,
                });
            }
            None => insert_header_line(&mut headers, line),
        }
    }

    let body = reached_body.then(|| {
        let mut body = lines.collect::<Vec<_>>().join("\n");
        if let Some(end) = body.find(NUL) {
            body.truncate(end);
        }
        body
    });

    Some(Frame {
        command: command.into(),
        headers,
        body,
    })
}

fn insert_header_line(headers: &mut Headers, line: &str) {
    match line.split_once(':') {
        Some((name, value)) => headers.insert(name, value),
        None => headers.insert(line, ""),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::header::HeaderKey;

    #[test]
    fn encode_without_headers_or_body() {
        let f = Frame::new(Command::Disconnect);
        assert_eq!(encode_frame(&f), "DISCONNECT\n\n\0");
    }

    #[test]
    fn encode_with_headers_and_body() {
        let f = Frame::new(Command::Send)
            .header(HeaderKey::Destination, "/queue/a")
            .header(HeaderKey::ContentType, "text/plain")
            .set_body("hi");
        assert_eq!(
            encode_frame(&f),
            "SEND\ndestination:/queue/a\ncontent-type:text/plain\n\nhi\0"
        );
    }

    #[test]
    fn encode_empty_body_matches_absent_body_on_wire() {
        let empty = Frame::new(Command::Send).set_body("");
        let absent = Frame::new(Command::Send);
        assert_eq!(encode_frame(&empty), encode_frame(&absent));
    }

    #[test]
    fn decode_message_frame() {
        let f = decode_frame("MESSAGE\ndestination:/topic/x\nmessage-id:7\n\n{\"a\":1}\0")
            .expect("frame");
        assert_eq!(f.command, "MESSAGE");
        assert_eq!(f.get_header("destination"), Some("/topic/x"));
        assert_eq!(f.get_header("message-id"), Some("7"));
        assert_eq!(f.body.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn decode_drops_one_leading_empty_line() {
        let f = decode_frame("\nCONNECTED\nsession:s1\n\n\0").expect("frame");
        assert_eq!(f.get_header("session"), Some("s1"));
        assert!(decode_frame("\n\nCONNECTED\n\n\0").is_none());
    }

    #[test]
    fn decode_heartbeat_is_none() {
        assert!(decode_frame(HEARTBEAT).is_none());
        assert!(decode_frame("").is_none());
    }

    #[test]
    fn decode_unknown_command_is_none() {
        assert!(decode_frame("SEND\ndestination:/q\n\nbody\0").is_none());
        assert!(decode_frame("connected\n\n\0").is_none());
    }

    #[test]
    fn decode_splits_on_first_colon() {
        let f = decode_frame("MESSAGE\nx-custom:a:b:c\n\n\0").expect("frame");
        assert_eq!(f.get_header("x-custom"), Some("a:b:c"));
    }

    #[test]
    fn decode_header_without_colon_has_empty_value() {
        let f = decode_frame("MESSAGE\nflag\ndestination:/q\n\n\0").expect("frame");
        assert_eq!(f.headers.len(), 2);
        assert_eq!(f.get_header("flag"), Some(""));
    }

    #[test]
    fn decode_repeated_header_keeps_last() {
        let f = decode_frame("MESSAGE\nk:1\nk:2\n\n\0").expect("frame");
        assert_eq!(f.headers.len(), 1);
        assert_eq!(f.get_header("k"), Some("2"));
    }

    #[test]
    fn decode_body_without_terminator() {
        let f = decode_frame("MESSAGE\ndestination:/q\n\npartial").expect("frame");
        assert_eq!(f.body.as_deref(), Some("partial"));
    }

    #[test]
    fn decode_ignores_bytes_after_terminator() {
        let f = decode_frame("MESSAGE\n\nbody\0\n\ngarbage").expect("frame");
        assert_eq!(f.body.as_deref(), Some("body"));
    }

    #[test]
    fn decode_keeps_newlines_inside_body() {
        let f = decode_frame("MESSAGE\n\nline one\nline two\0").expect("frame");
        assert_eq!(f.body.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn decode_without_blank_line_has_no_body() {
        let f = decode_frame("ERROR\nmessage:boom").expect("frame");
        assert_eq!(f.get_header("message"), Some("boom"));
        assert_eq!(f.body, None);

        let f = decode_frame("RECEIPT\nreceipt-id:r1\0").expect("frame");
        assert_eq!(f.get_header("receipt-id"), Some("r1"));
        assert_eq!(f.body, None);
    }

    #[test]
    fn decode_tolerates_crlf_command_line() {
        let f = decode_frame("CONNECTED\r\nversion:1.2\n\n\0").expect("frame");
        assert_eq!(f.command, "CONNECTED");
    }
}
