//! WebSocket Opening Handshake
//!
//! The first bytes on every connection are an HTTP/1.1 Upgrade request. The
//! server answers with `101 Switching Protocols` and from then on only
//! frames flow. The handshake happens exactly once per connection.
//!
//! ```text
//! client                                     server
//!   │  GET / HTTP/1.1                          │
//!   │  Sec-WebSocket-Key: <nonce>              │
//!   │ ───────────────────────────────────────> │
//!   │                                          │ accept = base64(sha1(nonce + GUID))
//!   │  HTTP/1.1 101 Switching Protocols        │
//!   │  Sec-WebSocket-Accept: <accept>          │
//!   │ <─────────────────────────────────────── │
//! ```
//!
//! Only `Sec-WebSocket-Key` is inspected. A request without it gets a bare
//! `400 Bad Request` and the connection is closed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use thiserror::Error;

/// GUID appended to the client key, fixed by RFC 6455.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Response sent when the request cannot be upgraded.
pub const BAD_REQUEST_RESPONSE: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

/// Largest header block accepted before giving up (8 KiB).
pub const MAX_HANDSHAKE_SIZE: usize = 8 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that end a connection during the handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The request has no Sec-WebSocket-Key header
    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    /// The client closed the connection before the blank line
    #[error("handshake request ended before the end of its headers")]
    Incomplete,

    /// The header block never terminated within the size limit
    #[error("handshake request too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// Returns the length of the header block including its terminating blank
/// line, or None if the block is not complete yet.
pub fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Computes the `Sec-WebSocket-Accept` value for a client key.
///
/// # Example
///
/// ```
/// use typedkv::protocol::handshake::accept_key;
///
/// assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// A parsed upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    key: String,
}

impl Handshake {
    /// Extracts the client key from a raw HTTP request head.
    ///
    /// Header names match case-insensitively; the value is trimmed.
    pub fn parse(request: &[u8]) -> Result<Self, HandshakeError> {
        let text = String::from_utf8_lossy(request);
        text.split("\r\n")
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("sec-websocket-key"))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(|key| Self {
                key: key.to_string(),
            })
            .ok_or(HandshakeError::MissingKey)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `101 Switching Protocols` response for this request.
    pub fn response(&self) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            accept_key(&self.key)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
Host: server.example.com\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_accept_key_vector() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_and_respond() {
        let handshake = Handshake::parse(REQUEST).unwrap();
        assert_eq!(handshake.key(), "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(
            handshake.response(),
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn test_header_name_is_case_insensitive() {
        let request = b"GET / HTTP/1.1\r\nsec-websocket-KEY:   abc==  \r\n\r\n";
        assert_eq!(Handshake::parse(request).unwrap().key(), "abc==");
    }

    #[test]
    fn test_missing_key() {
        let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\r\n";
        assert_eq!(Handshake::parse(request), Err(HandshakeError::MissingKey));

        let request = b"GET / HTTP/1.1\r\nSec-WebSocket-Key:\r\n\r\n";
        assert_eq!(Handshake::parse(request), Err(HandshakeError::MissingKey));
    }

    #[test]
    fn test_request_line_is_not_a_header() {
        let request = b"Sec-WebSocket-Key: abc\r\nHost: x\r\n\r\n";
        assert_eq!(Handshake::parse(request), Err(HandshakeError::MissingKey));
    }

    #[test]
    fn test_header_end() {
        assert_eq!(header_end(REQUEST), Some(REQUEST.len()));
        assert_eq!(header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);

        let mut with_frame = REQUEST.to_vec();
        with_frame.extend_from_slice(&[0x81, 0x80, 1, 2, 3, 4]);
        assert_eq!(header_end(&with_frame), Some(REQUEST.len()));
    }
}
