//! Snapshot Persistence
//!
//! Each namespace is saved to its own JSON file in the data directory:
//!
//! | namespace | file                |
//! |-----------|---------------------|
//! | strings   | `string_dump.json`  |
//! | numbers   | `number_dump.json`  |
//! | booleans  | `boolean_dump.json` |
//! | objects   | `object_dump.json`  |
//!
//! A file maps key name to `{ "data": <value>, "ttl": <epoch ms> | null }`.
//!
//! Loading never fails: a missing or unreadable file leaves that namespace
//! empty, and an unreadable entry is skipped on its own. Dumping writes the four files independently, so one failure does
//! not stop the others.

use crate::storage::store::{Entry, Namespace, TypedStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STRING_DUMP: &str = "string_dump.json";
pub const NUMBER_DUMP: &str = "number_dump.json";
pub const BOOLEAN_DUMP: &str = "boolean_dump.json";
pub const OBJECT_DUMP: &str = "object_dump.json";

/// Errors reading or writing a single dump file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk shape of one entry, as written.
#[derive(Debug, Serialize)]
struct PersistedEntry<T> {
    data: T,
    ttl: Option<u64>,
}

/// On-disk shape of one entry, as read back.
///
/// A fractional epoch-ms `ttl` is truncated.
#[derive(Debug, Deserialize)]
struct StoredEntry<T> {
    data: T,
    #[serde(default)]
    ttl: Option<f64>,
}

impl<T> StoredEntry<T> {
    fn into_entry(self) -> Entry<T> {
        let expires_at = self.ttl.map(|ms| from_epoch_millis(ms.max(0.0) as u64));
        Entry::new(self.data, expires_at)
    }
}

fn to_epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn from_epoch_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Loads and saves a [`TypedStore`] under a directory.
#[derive(Debug, Clone)]
pub struct Snapshot {
    dir: PathBuf,
}

impl Snapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Builds a store from whatever dump files are present and readable.
    pub fn load(&self) -> TypedStore {
        let mut store = TypedStore::new();
        *store.strings_mut() = self.load_namespace(STRING_DUMP);
        *store.numbers_mut() = self.load_namespace(NUMBER_DUMP);
        *store.booleans_mut() = self.load_namespace(BOOLEAN_DUMP);
        *store.objects_mut() = self.load_namespace(OBJECT_DUMP);
        store
    }

    fn load_namespace<T: DeserializeOwned + Clone>(&self, file: &str) -> Namespace<T> {
        match self.read_namespace(file) {
            Ok(Some(namespace)) => {
                info!(file, keys = namespace.len(), "Loaded dump");
                namespace
            }
            Ok(None) => {
                debug!(file, "No dump found, starting empty");
                Namespace::new()
            }
            Err(e) => {
                warn!(file, error = %e, "Ignoring unreadable dump");
                Namespace::new()
            }
        }
    }

    fn read_namespace<T: DeserializeOwned>(
        &self,
        file: &str,
    ) -> Result<Option<Namespace<T>>, SnapshotError> {
        let content = match fs::read_to_string(self.path(file)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Entries are converted one by one so a single bad entry costs only itself
        let raw: BTreeMap<String, Value> = serde_json::from_str(&content)?;
        let namespace = raw
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<StoredEntry<T>>(value) {
                Ok(stored) => Some((key, stored.into_entry())),
                Err(e) => {
                    warn!(file, key = %key, error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .collect();

        Ok(Some(namespace))
    }

    /// Writes all four namespaces.
    ///
    /// # Returns
    ///
    /// Returns how many of the four files were written. Failures are logged.
    pub fn dump(&self, store: &TypedStore) -> usize {
        let results = [
            (STRING_DUMP, self.write_namespace(STRING_DUMP, store.strings())),
            (NUMBER_DUMP, self.write_namespace(NUMBER_DUMP, store.numbers())),
            (BOOLEAN_DUMP, self.write_namespace(BOOLEAN_DUMP, store.booleans())),
            (OBJECT_DUMP, self.write_namespace(OBJECT_DUMP, store.objects())),
        ];

        let mut written = 0;
        for (file, result) in results {
            match result {
                Ok(()) => {
                    debug!(file, "Dump written");
                    written += 1;
                }
                Err(e) => warn!(file, error = %e, "Failed to write dump"),
            }
        }
        written
    }

    fn write_namespace<T: Serialize + Clone>(
        &self,
        file: &str,
        namespace: &Namespace<T>,
    ) -> Result<(), SnapshotError> {
        let persisted: BTreeMap<&str, PersistedEntry<&T>> = namespace
            .iter()
            .map(|(key, entry)| {
                let ttl = entry.expires_at.map(to_epoch_millis);
                (key.as_str(), PersistedEntry { data: &entry.data, ttl })
            })
            .collect();

        let content = serde_json::to_string_pretty(&persisted)?;

        // Write to a sibling temp file, then rename over the old dump
        let path = self.path(file);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}
