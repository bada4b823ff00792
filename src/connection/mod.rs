//! Connection Handler Module
//!
//! This module manages individual client connections.
//! Each client connection is handled by its own async task, so a slow
//! client never holds up the others.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  Handshake  │───>│ Decode frame│───>│ Execute req │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                            ▲                  │             │
//! │                            │                  ▼             │
//! │                            │          ┌─────────────┐       │
//! │                            └──────────│ Send frame  │       │
//! │                                       └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use typedkv::connection::{handle_connection, ConnectionStats};
//! use typedkv::commands::CommandHandler;
//! use typedkv::protocol::FrameDecoder;
//! use typedkv::storage::TypedStore;
//! use std::sync::{Arc, Mutex};
//!
//! let store = Arc::new(Mutex::new(TypedStore::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&store));
//! tokio::spawn(handle_connection(stream, addr, handler, FrameDecoder::default(), stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
