//! Mapping between WebSocket frames and opaque [`Message`] payloads.
//!
//! Payloads are never inspected beyond choosing the outbound frame type:
//! valid UTF-8 goes out as a text frame, anything else as binary.

use axum::extract::ws::Message as WsFrame;

use crate::domain::Message;

/// Classification of an inbound frame.
#[derive(Debug)]
pub enum Inbound {
    /// Text or binary data to forward to the bus.
    Payload(Message),
    /// The peer started the close handshake.
    Close,
    /// Ping/pong; answered by the transport.
    Control,
}

/// Classifies a frame read from a client.
#[must_use]
pub fn decode(frame: WsFrame) -> Inbound {
    match frame {
        WsFrame::Text(text) => Inbound::Payload(Message::from(text.as_str().to_owned())),
        WsFrame::Binary(bytes) => Inbound::Payload(Message::from(bytes)),
        WsFrame::Close(_) => Inbound::Close,
        WsFrame::Ping(_) | WsFrame::Pong(_) => Inbound::Control,
    }
}

/// Builds the frame written to a client for `message`.
///
/// The inbound frame type is not carried through the bus, so the outbound
/// type depends only on the bytes: valid UTF-8 is sent as a text frame, even
/// when a peer originally sent it as binary. The payload bytes are unchanged
/// either way; clients that need binary semantics should read both frame
/// types.
#[must_use]
pub fn encode(message: &Message) -> WsFrame {
    match message.as_text() {
        Some(text) => WsFrame::text(text.to_owned()),
        None => WsFrame::binary(message.clone().into_bytes()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn text_frame_round_trips_as_text() {
        let Inbound::Payload(message) = decode(WsFrame::text("hello")) else {
            panic!("expected payload");
        };
        assert_eq!(message.as_text(), Some("hello"));
        assert!(matches!(encode(&message), WsFrame::Text(t) if t.as_str() == "hello"));
    }

    #[test]
    fn non_utf8_goes_out_as_binary() {
        let message = Message::from(vec![0xc3, 0x28]);
        assert!(matches!(
            encode(&message),
            WsFrame::Binary(b) if b == Bytes::from_static(&[0xc3, 0x28])
        ));
    }

    #[test]
    fn utf8_binary_frame_goes_out_as_text() {
        let Inbound::Payload(message) = decode(WsFrame::Binary(Bytes::from_static(b"hi"))) else {
            panic!("expected payload");
        };
        assert!(matches!(encode(&message), WsFrame::Text(t) if t.as_str() == "hi"));
    }

    #[test]
    fn binary_frame_is_forwarded_verbatim() {
        let Inbound::Payload(message) = decode(WsFrame::Binary(Bytes::from_static(&[1, 2, 3])))
        else {
            panic!("expected payload");
        };
        assert_eq!(message.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn control_and_close_frames_are_not_payloads() {
        assert!(matches!(decode(WsFrame::Close(None)), Inbound::Close));
        assert!(matches!(
            decode(WsFrame::Ping(Bytes::new())),
            Inbound::Control
        ));
    }
}
