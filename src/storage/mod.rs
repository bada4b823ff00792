//! Storage Module
//!
//! This module holds the typed store, its snapshot persistence and the
//! optional background sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              SharedStore = Arc<Mutex<TypedStore>>           │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐        │
//! │  │ strings  │ │ numbers  │ │ booleans │ │ objects  │        │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                  ▲                        ▲
//!        │ load / dump      │ purge_expired          │ per request
//!  ┌─────┴──────┐    ┌──────┴────────┐      ┌────────┴───────┐
//!  │  Snapshot  │    │ ExpirySweeper │      │ CommandHandler │
//!  └────────────┘    └───────────────┘      └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use typedkv::storage::{DataType, TypedStore};
//! use std::time::Duration;
//!
//! let mut store = TypedStore::new();
//! store.strings_mut().add("session", "token123".to_string(), Some(Duration::from_secs(3600)));
//!
//! assert_eq!(store.strings_mut().get("session"), Some("token123".to_string()));
//! assert!(store.remove_ttl(DataType::Str, "session"));
//! ```

pub mod expiry;
pub mod snapshot;
pub mod store;

use std::sync::{Arc, Mutex};

// Re-export commonly used types
pub use expiry::ExpirySweeper;
pub use snapshot::{Snapshot, SnapshotError};
pub use store::{DataType, Entry, InvalidDataType, Namespace, TypedStore};

/// The store as shared between connections, the sweeper and shutdown.
pub type SharedStore = Arc<Mutex<TypedStore>>;
