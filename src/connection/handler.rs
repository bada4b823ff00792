//! Connection Handler Module
//!
//! This module handles individual client connections.
//! Each client gets its own handler task that first upgrades the connection
//! to WebSocket and then runs in a loop, decoding request frames and sending
//! response frames.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. HTTP Upgrade ──(no Sec-WebSocket-Key)──> 400 Bad Request, close
//!        │
//!        │ 101 Switching Protocols
//!        ▼
//! 4. ┌──────────────────────────────┐
//!    │      Frame Loop              │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode + unmask frame   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute JSON request    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send text frame         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 5. Client disconnects / error
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol: a frame may arrive split across reads, and one read may carry
//! several frames (or the tail of the upgrade request followed by frames).

use crate::commands::CommandHandler;
use crate::protocol::frame::{encode_text, Frame, FrameDecoder, FrameError};
use crate::protocol::handshake::{
    header_end, Handshake, HandshakeError, BAD_REQUEST_RESPONSE, MAX_HANDSHAKE_SIZE,
};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Upgrade requests answered with 400
    pub handshakes_rejected: AtomicU64,
    /// Total request frames processed
    pub frames_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the handshake paths can be driven by mock
/// I/O in tests; the server always uses a `TcpStream`.
pub struct ConnectionHandler<S> {
    /// The stream for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared store behind it)
    command_handler: CommandHandler,

    /// Frame decoder with the configured payload limit
    decoder: FrameDecoder,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionHandler<S> {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing requests
    /// * `decoder` - Frame decoder, carrying the maximum payload size
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        decoder: FrameDecoder,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            decoder,
            stats,
        }
    }

    /// Runs the connection: handshake, then the frame loop until the client
    /// disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = match self.negotiate().await {
            Ok(()) => self.frame_loop().await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// Reads the upgrade request and answers it.
    ///
    /// Bytes after the blank line stay in the buffer for the frame loop.
    async fn negotiate(&mut self) -> Result<(), ConnectionError> {
        loop {
            if let Some(end) = header_end(&self.buffer) {
                let head = self.buffer.split_to(end);
                return match Handshake::parse(&head) {
                    Ok(handshake) => {
                        let response = handshake.response();
                        self.send_raw(response.as_bytes()).await?;
                        debug!(client = %self.addr, "WebSocket handshake completed");
                        Ok(())
                    }
                    Err(e) => self.reject(e).await,
                };
            }

            if self.buffer.len() > MAX_HANDSHAKE_SIZE {
                let size = self.buffer.len();
                return self
                    .reject(HandshakeError::TooLarge {
                        size,
                        max: MAX_HANDSHAKE_SIZE,
                    })
                    .await;
            }

            match self.read_more_data().await {
                Err(ConnectionError::UnexpectedEof) => {
                    return self.reject(HandshakeError::Incomplete).await;
                }
                result => result?,
            }
        }
    }

    /// Answers 400 and closes the write side.
    async fn reject(&mut self, error: HandshakeError) -> Result<(), ConnectionError> {
        warn!(client = %self.addr, error = %error, "Rejecting handshake");
        self.stats.handshake_rejected();

        self.send_raw(BAD_REQUEST_RESPONSE).await?;
        self.stream.shutdown().await?;

        Err(ConnectionError::Handshake(error))
    }

    /// The decode-execute-respond loop.
    async fn frame_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_decode_frame()? {
                let response = self.command_handler.execute(&frame.text());
                self.stats.frame_processed();

                self.send_raw(&encode_text(response.as_bytes())).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to decode one frame from the buffer.
    fn try_decode_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.decoder.decode(&self.buffer)? {
            Some((frame, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    opcode = frame.opcode,
                    payload = frame.payload.len(),
                    remaining = self.buffer.len(),
                    "Decoded frame"
                );
                Ok(Some(frame))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete frame, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial request or frame in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes bytes and flushes them to the client.
    async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Undecodable frame
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Upgrade request rejected
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    decoder: FrameDecoder,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, decoder, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
