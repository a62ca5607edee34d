//! Opaque broadcast payload.
//!
//! [`Message`] wraps a [`Bytes`] buffer. It carries no identity and no
//! origin: a message relayed from the bus looks the same whether it was
//! published by this instance or by a peer. Cloning is a reference-count
//! bump, so the same payload can be queued to every connection without
//! copying.

use std::fmt;

use bytes::Bytes;

/// Immutable opaque byte payload fanned out to every connected client.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Message(Bytes);

impl Message {
    /// Creates a message from anything convertible into [`Bytes`].
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the payload as `&str` when it is valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Consumes the message, returning the underlying buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a zero-length payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads can be large and are user data; only the size is logged.
impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message").field("len", &self.0.len()).finish()
    }
}

impl From<Bytes> for Message {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

impl From<&'static str> for Message {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Message> for Bytes {
    fn from(message: Message) -> Self {
        message.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_is_exposed_as_str() {
        let msg = Message::from("hello");
        assert_eq!(msg.as_text(), Some("hello"));
        assert_eq!(msg.len(), 5);
    }

    #[test]
    fn binary_payload_has_no_text_view() {
        let msg = Message::from(vec![0xff, 0xfe, 0x00]);
        assert!(msg.as_text().is_none());
        assert_eq!(msg.as_bytes(), &[0xff, 0xfe, 0x00]);
    }

    #[test]
    fn clones_share_the_buffer() {
        let msg = Message::from(String::from("shared"));
        let copy = msg.clone();
        assert_eq!(msg.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
    }

    #[test]
    fn debug_hides_payload() {
        let msg = Message::from("secret");
        let rendered = format!("{msg:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("len"));
    }

    #[test]
    fn default_is_empty() {
        assert!(Message::default().is_empty());
    }
}
