//! Command Handler Module
//!
//! This module implements the command processing layer.
//! It receives the text of one frame, validates it as a JSON request,
//! executes it against the typed store, and returns the JSON response text.
//!
//! ## Architecture
//!
//! ```text
//! Frame payload (text)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │    Request      │  (request module: envelope, event, coercion)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Encode       │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   TypedStore    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Events
//!
//! - `sset`, `sget`, `sdel` - strings
//! - `nset`, `nget`, `ndel`, `incr` - numbers
//! - `bset`, `bget`, `bdel` - booleans
//! - `oset`, `oget`, `odel` - JSON values
//! - `sttl`, `gttl`, `rmttl` - expiry, by namespace selector

pub mod handler;
pub mod request;

// Re-export the main command handler
pub use handler::{CommandError, CommandHandler};
pub use request::{Command, Request};
