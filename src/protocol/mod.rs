//! WebSocket Protocol Implementation
//!
//! This module provides the minimal WebSocket support the server needs.
//!
//! ## Overview
//!
//! A connection starts with an HTTP Upgrade request and continues with
//! WebSocket frames. Each inbound frame carries one JSON request; each
//! response goes back as one unmasked text frame.
//!
//! ## Modules
//!
//! - `handshake`: Upgrade request parsing and `Sec-WebSocket-Accept` derivation
//! - `frame`: Incremental frame decoder and length-tiered encoder
//!
//! ## Example
//!
//! ```
//! use typedkv::protocol::{encode_masked_text, encode_text, FrameDecoder};
//!
//! // Decoding a client frame
//! let wire = encode_masked_text(br#"{"event":"sget","key":"a"}"#, [1, 2, 3, 4]);
//! let (frame, consumed) = FrameDecoder::default().decode(&wire).unwrap().unwrap();
//! assert_eq!(consumed, wire.len());
//! assert_eq!(frame.text(), r#"{"event":"sget","key":"a"}"#);
//!
//! // Encoding a response
//! let bytes = encode_text(b"\"hello\"");
//! assert_eq!(bytes[0], 0x81);
//! ```

pub mod frame;
pub mod handshake;

// Re-export commonly used types for convenience
pub use frame::{encode_masked_text, encode_text, Frame, FrameDecoder, FrameError, FrameResult};
pub use handshake::{accept_key, Handshake, HandshakeError};
