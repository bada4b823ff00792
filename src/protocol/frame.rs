//! WebSocket Frame Codec
//!
//! Only the subset of RFC 6455 the server needs: single, unfragmented data
//! frames. Control frames are not treated specially.
//!
//! ## Frame Layout
//!
//! ```text
//!  byte 0     byte 1      extended length     masking key   payload
//! ┌────────┬───────────┬──────────────────┬─────────────┬─────────┐
//! │FIN|op  │MASK|len7  │ 0, 2 or 8 bytes  │ 0 or 4 bytes│  len    │
//! └────────┴───────────┴──────────────────┴─────────────┴─────────┘
//! ```
//!
//! `len7` is the payload length when it is at most 125. The value 126 means
//! a 16-bit big-endian length follows, 127 a 64-bit one.
//!
//! The decoder works like an incremental parser: it returns
//! `Ok(Some((frame, consumed)))` for a complete frame, `Ok(None)` when more
//! bytes are needed, and an error for frames it refuses to buffer.

use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use thiserror::Error;

/// FIN bit plus the text opcode. The first byte of every server frame.
pub const FIN_TEXT: u8 = 0x81;

/// Largest length that fits in the 7-bit field.
const MAX_SHORT_LENGTH: usize = 125;

const LENGTH_16: u8 = 126;
const LENGTH_64: u8 = 127;

/// Default upper bound on an accepted payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// The declared payload exceeds what the decoder will buffer
    #[error("frame payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: u64, max: usize },
}

/// Result type for decoding operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// A decoded WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Whether the FIN bit was set
    pub fin: bool,
    /// Low nibble of the first byte
    pub opcode: u8,
    /// Unmasked payload
    pub payload: Bytes,
}

impl Frame {
    /// The payload as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Decodes client frames from a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_payload: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Attempts to decode one frame from the start of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((frame, consumed)))` - A complete frame occupying `consumed` bytes
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - The frame is too large to accept
    pub fn decode(&self, buf: &[u8]) -> FrameResult<Option<(Frame, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let fin = buf[0] & 0x80 != 0;
        let opcode = buf[0] & 0x0f;
        let masked = buf[1] & 0x80 != 0;

        let (length, mut offset) = match buf[1] & 0x7f {
            LENGTH_16 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            LENGTH_64 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut be = [0u8; 8];
                be.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(be), 10)
            }
            short => (u64::from(short), 2),
        };

        if length > self.max_payload as u64 {
            return Err(FrameError::PayloadTooLarge {
                size: length,
                max: self.max_payload,
            });
        }
        let length = length as usize;

        let mask = if masked {
            if buf.len() < offset + 4 {
                return Ok(None);
            }
            let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        let end = offset + length;
        if buf.len() < end {
            return Ok(None);
        }

        let mut payload = buf[offset..end].to_vec();
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Some((
            Frame {
                fin,
                opcode,
                payload: Bytes::from(payload),
            },
            end,
        )))
    }
}

/// XORs `payload` in place with the 4-byte masking key.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Size of the header for a payload of `len` bytes, excluding any mask.
pub fn header_len(len: usize) -> usize {
    if len <= MAX_SHORT_LENGTH {
        2
    } else if len <= u16::MAX as usize {
        4
    } else {
        10
    }
}

/// Writes the second header byte and any extended length.
fn put_length(out: &mut BytesMut, len: usize, mask_bit: u8) {
    if len <= MAX_SHORT_LENGTH {
        out.put_u8(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.put_u8(mask_bit | LENGTH_16);
        out.put_u16(len as u16);
    } else {
        out.put_u8(mask_bit | LENGTH_64);
        out.put_u64(len as u64);
    }
}

/// Encodes an unmasked server text frame.
///
/// # Example
///
/// ```
/// use typedkv::protocol::frame::encode_text;
///
/// let frame = encode_text(b"1");
/// assert_eq!(&frame[..], &[0x81, 0x01, b'1']);
/// ```
pub fn encode_text(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(header_len(payload.len()) + payload.len());
    out.put_u8(FIN_TEXT);
    put_length(&mut out, payload.len(), 0);
    out.extend_from_slice(payload);
    out.freeze()
}

/// Encodes a masked client text frame, as a browser would send it.
pub fn encode_masked_text(payload: &[u8], key: [u8; 4]) -> Bytes {
    let mut out = BytesMut::with_capacity(header_len(payload.len()) + 4 + payload.len());
    out.put_u8(FIN_TEXT);
    put_length(&mut out, payload.len(), 0x80);
    out.extend_from_slice(&key);

    let start = out.len();
    out.extend_from_slice(payload);
    apply_mask(&mut out[start..], key);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    fn payload_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_encode_header_tiers() {
        for (len, expected_header) in [(0, 2), (125, 2), (126, 4), (65535, 4), (65536, 10)] {
            let payload = payload_of(len);
            let frame = encode_text(&payload);
            assert_eq!(frame.len() - len, expected_header, "payload length {}", len);
            assert_eq!(frame[0], 0x81);
            assert_eq!(frame[1] & 0x80, 0, "server frames are never masked");
            assert_eq!(&frame[expected_header..], &payload[..]);
        }
    }

    #[test]
    fn test_encode_extended_lengths() {
        let frame = encode_text(&payload_of(126));
        assert_eq!(&frame[1..4], &[126, 0x00, 0x7e]);

        let frame = encode_text(&payload_of(65536));
        assert_eq!(&frame[1..10], &[127, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_masked_tiers() {
        let decoder = FrameDecoder::default();
        for len in [0, 125, 126, 65535, 65536] {
            let payload = payload_of(len);
            let wire = encode_masked_text(&payload, KEY);
            assert_eq!(wire.len(), header_len(len) + 4 + len);

            let (frame, consumed) = decoder.decode(&wire).unwrap().unwrap();
            assert_eq!(consumed, wire.len());
            assert_eq!(&frame.payload[..], &payload[..], "payload length {}", len);
            assert!(frame.fin);
            assert_eq!(frame.opcode, 0x1);
        }
    }

    #[test]
    fn test_decode_rfc_example() {
        // "Hello" masked, from RFC 6455 section 5.7
        let wire = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let (frame, consumed) = FrameDecoder::default().decode(&wire).unwrap().unwrap();
        assert_eq!(consumed, 11);
        assert_eq!(frame.text(), "Hello");
    }

    #[test]
    fn test_decode_unmasked() {
        let wire = encode_text(b"plain");
        let (frame, _) = FrameDecoder::default().decode(&wire).unwrap().unwrap();
        assert_eq!(frame.text(), "plain");
    }

    #[test]
    fn test_decode_incomplete() {
        let decoder = FrameDecoder::default();
        let wire = encode_masked_text(&payload_of(300), KEY);

        // Every strict prefix needs more data
        for cut in [0, 1, 2, 3, 5, 7, 8, wire.len() - 1] {
            assert_eq!(decoder.decode(&wire[..cut]), Ok(None), "prefix {}", cut);
        }
    }

    #[test]
    fn test_decode_consecutive_frames() {
        let decoder = FrameDecoder::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_masked_text(b"first", KEY));
        buf.extend_from_slice(&encode_masked_text(b"second", [1, 2, 3, 4]));

        let (frame, consumed) = decoder.decode(&buf).unwrap().unwrap();
        assert_eq!(frame.text(), "first");
        let _ = buf.split_to(consumed);

        let (frame, consumed) = decoder.decode(&buf).unwrap().unwrap();
        assert_eq!(frame.text(), "second");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let decoder = FrameDecoder::new(1024);
        let wire = encode_masked_text(&payload_of(2048), KEY);
        assert_eq!(
            decoder.decode(&wire[..4]),
            Err(FrameError::PayloadTooLarge {
                size: 2048,
                max: 1024
            })
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let wire = encode_masked_text(&[b'a', 0xff, b'b'], KEY);
        let (frame, _) = FrameDecoder::default().decode(&wire).unwrap().unwrap();
        assert_eq!(frame.text(), "a\u{fffd}b");
    }
}
