//! Typed Store with Lazy Expiry
//!
//! The store keeps four independent namespaces, one per value type:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TypedStore                           │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐ │
//! │  │  strings   │ │  numbers   │ │  booleans  │ │  objects   │ │
//! │  │ Entry<Str> │ │ Entry<f64> │ │ Entry<bool>│ │Entry<Value>│ │
//! │  └────────────┘ └────────────┘ └────────────┘ └────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same key may live in several namespaces at once; they never interact.
//!
//! ## Expiry
//!
//! Every entry carries an optional absolute deadline. Reads check it and
//! remove the entry when the deadline has passed ("lazy expiry"), so an
//! expired entry is indistinguishable from a missing one.
//!
//! ## Overwrites
//!
//! Adding a key that is already live replaces the data but keeps the old
//! deadline. A TTL passed to `add` only applies to newly created keys.

use serde_json::Value;
use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::trace;

/// A stored value with an optional expiry deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    /// The stored value
    pub data: T,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<SystemTime>,
}

impl<T> Entry<T> {
    pub fn new(data: T, expires_at: Option<SystemTime>) -> Self {
        Self { data, expires_at }
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Time left before expiry, or None if the entry never expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|exp| {
            exp.duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}

/// Computes the absolute deadline `ttl` from now.
///
/// Returns None when the deadline is not representable.
fn deadline(ttl: Duration) -> Option<SystemTime> {
    SystemTime::now().checked_add(ttl)
}

/// Selects one of the four namespaces for TTL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Str,
    Num,
    Bool,
    Obj,
}

impl DataType {
    pub const ALL: [DataType; 4] = [DataType::Str, DataType::Num, DataType::Bool, DataType::Obj];

    /// The selector string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Str => "str",
            DataType::Num => "num",
            DataType::Bool => "bool",
            DataType::Obj => "obj",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a selector does not name a namespace.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid Data type")]
pub struct InvalidDataType(pub String);

impl FromStr for DataType {
    type Err = InvalidDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" => Ok(DataType::Str),
            "num" => Ok(DataType::Num),
            "bool" => Ok(DataType::Bool),
            "obj" => Ok(DataType::Obj),
            other => Err(InvalidDataType(other.to_string())),
        }
    }
}

/// One typed namespace: key name to entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace<T> {
    entries: HashMap<String, Entry<T>>,
}

impl<T> Default for Namespace<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> Namespace<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live entry for `key`, removing it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut Entry<T>> {
        if self.entries.get(key)?.is_expired() {
            self.entries.remove(key);
            trace!(key, "Lazily expired entry");
            return None;
        }
        self.entries.get_mut(key)
    }

    /// Creates or overwrites `key`.
    ///
    /// An existing live entry keeps its deadline; `ttl` is only applied when
    /// the key is created.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn add(&mut self, key: impl Into<String>, data: T, ttl: Option<Duration>) -> bool {
        let key = key.into();
        let existing = self.live_entry(&key).map(|entry| entry.expires_at);
        let created = existing.is_none();
        let expires_at = existing.unwrap_or_else(|| ttl.and_then(deadline));

        self.entries.insert(key, Entry::new(data, expires_at));
        created
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.live_entry(key).map(|entry| entry.data.clone())
    }

    /// Deletes a key.
    ///
    /// Returns `true` if a live entry was removed. An expired entry is
    /// dropped as well but reported as absent.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Sets a deadline `ttl` from now on an existing key.
    pub fn set_ttl(&mut self, key: &str, ttl: Duration) -> bool {
        match self.live_entry(key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                true
            }
            None => false,
        }
    }

    /// Time left on `key`, or None if it is missing, expired or persistent.
    pub fn ttl(&mut self, key: &str) -> Option<Duration> {
        self.live_entry(key).and_then(|entry| entry.remaining())
    }

    /// Makes an existing key persistent.
    pub fn remove_ttl(&mut self, key: &str) -> bool {
        match self.live_entry(key) {
            Some(entry) => {
                entry.expires_at = None;
                true
            }
            None => false,
        }
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = SystemTime::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all stored entries without checking expiry.
    pub fn iter(&self) -> hash_map::Iter<'_, String, Entry<T>> {
        self.entries.iter()
    }
}

impl Namespace<f64> {
    /// Adds `delta` to a live numeric entry and returns the new value.
    ///
    /// Missing or expired keys are not created; the result is `None`.
    pub fn increment(&mut self, key: &str, delta: f64) -> Option<f64> {
        let entry = self.live_entry(key)?;
        entry.data += delta;
        Some(entry.data)
    }
}

impl<T> FromIterator<(String, Entry<T>)> for Namespace<T> {
    fn from_iter<I: IntoIterator<Item = (String, Entry<T>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// TTL operations shared by every namespace, so the store can pick one by
/// selector and call through a single code path.
trait ExpiryControl {
    fn set_ttl(&mut self, key: &str, ttl: Duration) -> bool;
    fn ttl(&mut self, key: &str) -> Option<Duration>;
    fn remove_ttl(&mut self, key: &str) -> bool;
    fn purge_expired(&mut self) -> usize;
}

impl<T: Clone> ExpiryControl for Namespace<T> {
    fn set_ttl(&mut self, key: &str, ttl: Duration) -> bool {
        Namespace::set_ttl(self, key, ttl)
    }

    fn ttl(&mut self, key: &str) -> Option<Duration> {
        Namespace::ttl(self, key)
    }

    fn remove_ttl(&mut self, key: &str) -> bool {
        Namespace::remove_ttl(self, key)
    }

    fn purge_expired(&mut self) -> usize {
        Namespace::purge_expired(self)
    }
}

/// The process-wide store: four typed namespaces.
///
/// The store itself does no locking. The server wraps it in
/// [`SharedStore`](crate::storage::SharedStore) and holds the lock for the
/// whole of each request.
///
/// # Example
///
/// ```
/// use typedkv::storage::{DataType, TypedStore};
/// use std::time::Duration;
///
/// let mut store = TypedStore::new();
/// store.strings_mut().add("name", "Ariz".to_string(), None);
/// assert_eq!(store.strings_mut().get("name"), Some("Ariz".to_string()));
///
/// store.numbers_mut().add("hits", 5.0, Some(Duration::from_secs(60)));
/// assert!(store.ttl(DataType::Num, "hits").is_some());
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TypedStore {
    strings: Namespace<String>,
    numbers: Namespace<f64>,
    booleans: Namespace<bool>,
    objects: Namespace<Value>,
}

impl TypedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strings(&self) -> &Namespace<String> {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut Namespace<String> {
        &mut self.strings
    }

    pub fn numbers(&self) -> &Namespace<f64> {
        &self.numbers
    }

    pub fn numbers_mut(&mut self) -> &mut Namespace<f64> {
        &mut self.numbers
    }

    pub fn booleans(&self) -> &Namespace<bool> {
        &self.booleans
    }

    pub fn booleans_mut(&mut self) -> &mut Namespace<bool> {
        &mut self.booleans
    }

    pub fn objects(&self) -> &Namespace<Value> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut Namespace<Value> {
        &mut self.objects
    }

    fn expiry_control(&mut self, data_type: DataType) -> &mut dyn ExpiryControl {
        match data_type {
            DataType::Str => &mut self.strings,
            DataType::Num => &mut self.numbers,
            DataType::Bool => &mut self.booleans,
            DataType::Obj => &mut self.objects,
        }
    }

    /// Sets a deadline `ttl` from now on `key` in the selected namespace.
    pub fn set_ttl(&mut self, data_type: DataType, key: &str, ttl: Duration) -> bool {
        let found = self.expiry_control(data_type).set_ttl(key, ttl);
        trace!(namespace = %data_type, key, ttl_ms = ttl.as_millis() as u64, found, "Set TTL");
        found
    }

    /// Remaining time on `key` in the selected namespace.
    pub fn ttl(&mut self, data_type: DataType, key: &str) -> Option<Duration> {
        self.expiry_control(data_type).ttl(key)
    }

    /// Clears the deadline on `key` in the selected namespace.
    pub fn remove_ttl(&mut self, data_type: DataType, key: &str) -> bool {
        let found = self.expiry_control(data_type).remove_ttl(key);
        trace!(namespace = %data_type, key, found, "Removed TTL");
        found
    }

    /// Removes expired entries from all namespaces.
    pub fn purge_expired(&mut self) -> usize {
        DataType::ALL
            .into_iter()
            .map(|data_type| self.expiry_control(data_type).purge_expired())
            .sum()
    }

    /// Total number of stored entries across all namespaces.
    pub fn len(&self) -> usize {
        self.strings.len() + self.numbers.len() + self.booleans.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
