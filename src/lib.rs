//! # TypedKV - A Typed In-Memory Key-Value Store over WebSocket
//!
//! TypedKV keeps four independent typed namespaces (strings, numbers,
//! booleans and JSON values) with per-key expiry, and serves them through a
//! small JSON command protocol carried in WebSocket text frames.
//!
//! ## Features
//!
//! - **Typed Namespaces**: The same key can exist independently as a string,
//!   a number, a boolean and a JSON value
//! - **TTL Support**: Absolute per-key deadlines, checked on every access
//! - **WebSocket Transport**: Minimal RFC 6455 handshake and framing
//! - **Snapshots**: The whole store is loaded from and dumped to four JSON
//!   files across restarts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TypedKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌──────────────────────────────┐   ┌─────────────────────────────────┐ │
//! │  │ Handshake + FrameDecoder     │   │   TypedStore (Arc<Mutex<..>>)   │ │
//! │  └──────────────────────────────┘   │  str │ num │ bool │ obj         │ │
//! │                                     └─────────────────────────────────┘ │
//! │                                        ▲                    ▲           │
//! │                          ┌─────────────┴──────┐   ┌─────────┴────────┐  │
//! │                          │   ExpirySweeper    │   │ Snapshot (files) │  │
//! │                          └────────────────────┘   └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use typedkv::commands::CommandHandler;
//! use typedkv::connection::{handle_connection, ConnectionStats};
//! use typedkv::protocol::FrameDecoder;
//! use typedkv::storage::Snapshot;
//! use std::sync::{Arc, Mutex};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let snapshot = Snapshot::new(".");
//!     let store = Arc::new(Mutex::new(snapshot.load()));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&store));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, FrameDecoder::default(), stats));
//!     }
//! }
//! ```
//!
//! ## Request Format
//!
//! ```json
//! { "event": "sset", "key": "greeting", "value": ["hello", "world"], "ttl": 60 }
//! ```
//!
//! Every request gets exactly one response frame holding a JSON value:
//! `1` for a successful write, the stored value or `null` for reads, a
//! boolean for deletes, or an error message string.
//!
//! ## Module Overview
//!
//! - [`protocol`]: WebSocket handshake and frame codec
//! - [`storage`]: Typed namespaces, expiry, snapshots
//! - [`commands`]: JSON request parsing and dispatch
//! - [`connection`]: Client connection management
//! - [`config`]: Command-line configuration
//!
//! ## Design Highlights
//!
//! ### One Lock Per Request
//!
//! The store sits behind a single mutex that is held for the whole of each
//! request, so no two requests' store operations ever interleave.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A background task periodically purges expired keys
//!
//! Only the lazy check decides what clients see; the sweeper reclaims memory.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use config::{Invocation, ServerConfig};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{FrameDecoder, Handshake};
pub use storage::{DataType, ExpirySweeper, SharedStore, Snapshot, TypedStore};

/// The default port TypedKV listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host TypedKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of TypedKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
