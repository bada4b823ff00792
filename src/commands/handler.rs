//! Command Handler Module
//!
//! This module turns one JSON request into store operations and returns the
//! JSON-encoded response text.
//!
//! ## Supported Events
//!
//! ### Reads and Deletes (no value needed)
//! - `sget`, `nget`, `bget`, `oget` - Read a key, or `null`
//! - `sdel`, `ndel`, `bdel`, `odel` - Delete a key, `true` if it existed
//! - `incr` - Add `value` (default 1) to a number, or `null` if missing
//!
//! ### Writes
//! - `sset` - Store text; arrays are joined with spaces
//! - `nset` - Store a number
//! - `bset` - Store a boolean; any nonzero number is `true`
//! - `oset` - Store a JSON value; arrays are joined and parsed as JSON
//!
//! ### TTL (value is `[selector, ...]`, selector one of `str|num|bool|obj`)
//! - `sttl` - `[selector, seconds]` sets a deadline
//! - `gttl` - `[selector]` remaining seconds, or `null`
//! - `rmttl` - `[selector]` makes the key persistent
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  validate   │───>│  dispatch() │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                          TypedStore         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors never escape: they become a JSON string on the same channel as
//! successful results.

use crate::commands::request::{
    args_of, first_arg, is_empty_value, joined, number_value, text_of, to_number, ttl_from_secs,
    Command, Request,
};
use crate::storage::{DataType, InvalidDataType, SharedStore, TypedStore};
use serde_json::Value;
use std::sync::PoisonError;
use tracing::{debug, trace};

/// Errors reported to the client as a JSON string.
///
/// The `Display` text is exactly what the client receives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Error: Invalid JSON format.")]
    MalformedJson,

    #[error("Error: Invalid input. Valid key is required.")]
    MissingKey,

    #[error("Error: Invalid input. Valid key and value are required.")]
    MissingValue,

    #[error("Error: Invalid input. Value must be a valid number.")]
    InvalidNumber,

    #[error("Error: Invalid input. Value must be 1 for true or 0 for false.")]
    InvalidBoolean,

    #[error("Error: Invalid input. Value must be a valid JSON object. Use \" \" in place of ' '.")]
    InvalidObject,

    #[error("Error: Invalid input. Valid key and TTL are required.")]
    InvalidTtl,

    #[error("Invalid Data type")]
    InvalidDataType(#[from] InvalidDataType),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Executes requests against the shared store.
#[derive(Clone)]
pub struct CommandHandler {
    /// The store, shared with every connection
    store: SharedStore,
}

impl CommandHandler {
    /// Creates a new command handler with the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Executes one request and returns the JSON-encoded response.
    ///
    /// # Example
    ///
    /// ```
    /// use typedkv::commands::CommandHandler;
    /// use typedkv::storage::TypedStore;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let handler = CommandHandler::new(Arc::new(Mutex::new(TypedStore::new())));
    /// assert_eq!(handler.execute(r#"{"event":"sset","key":"a","value":"hello"}"#), "1");
    /// assert_eq!(handler.execute(r#"{"event":"sget","key":"a"}"#), r#""hello""#);
    /// ```
    pub fn execute(&self, request: &str) -> String {
        let response = match self.try_execute(request) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Request rejected");
                Value::String(e.to_string())
            }
        };
        response.to_string()
    }

    fn try_execute(&self, text: &str) -> Result<Value, CommandError> {
        let request = Request::parse(text)?;
        let key = request.key().ok_or(CommandError::MissingKey)?;
        let command = Command::parse(request.event.as_ref());

        let value = request.value.as_ref().filter(|v| !is_empty_value(v));
        if command.requires_value() && value.is_none() {
            return Err(CommandError::MissingValue);
        }

        trace!(?command, key = %key, "Dispatching");

        // Held for the whole operation so requests never interleave
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        dispatch(&mut store, command, &key, value, &request)
    }
}

/// Dispatches a validated command to its handler.
fn dispatch(
    store: &mut TypedStore,
    command: Command,
    key: &str,
    value: Option<&Value>,
    request: &Request,
) -> Result<Value, CommandError> {
    match (command, value) {
        (Command::Get(data_type), _) => Ok(cmd_get(store, data_type, key)),
        (Command::Delete(data_type), _) => Ok(cmd_del(store, data_type, key)),
        (Command::Incr, value) => Ok(cmd_incr(store, key, value)),
        (Command::Set(data_type), Some(value)) => cmd_set(store, data_type, key, value, request),
        (Command::SetTtl, Some(value)) => cmd_sttl(store, key, value),
        (Command::GetTtl, Some(value)) => cmd_gttl(store, key, value),
        (Command::RemoveTtl, Some(value)) => cmd_rmttl(store, key, value),
        (Command::Unknown(event), Some(_)) => Err(CommandError::UnknownCommand(event)),
        (_, None) => Err(CommandError::MissingValue),
    }
}

fn ok() -> Value {
    Value::from(1)
}

// ============================================================================
// Reads and Deletes
// ============================================================================

/// sget / nget / bget / oget
fn cmd_get(store: &mut TypedStore, data_type: DataType, key: &str) -> Value {
    let value = match data_type {
        DataType::Str => store.strings_mut().get(key).map(Value::String),
        DataType::Num => store.numbers_mut().get(key).map(number_value),
        DataType::Bool => store.booleans_mut().get(key).map(Value::Bool),
        DataType::Obj => store.objects_mut().get(key),
    };
    value.unwrap_or(Value::Null)
}

/// sdel / ndel / bdel / odel
fn cmd_del(store: &mut TypedStore, data_type: DataType, key: &str) -> Value {
    let removed = match data_type {
        DataType::Str => store.strings_mut().delete(key),
        DataType::Num => store.numbers_mut().delete(key),
        DataType::Bool => store.booleans_mut().delete(key),
        DataType::Obj => store.objects_mut().delete(key),
    };
    Value::Bool(removed)
}

/// incr key [delta]
fn cmd_incr(store: &mut TypedStore, key: &str, value: Option<&Value>) -> Value {
    let delta = value
        .and_then(|v| to_number(first_arg(v)))
        .unwrap_or(1.0);

    store
        .numbers_mut()
        .increment(key, delta)
        .map(number_value)
        .unwrap_or(Value::Null)
}

// ============================================================================
// Writes
// ============================================================================

/// sset / nset / bset / oset
fn cmd_set(
    store: &mut TypedStore,
    data_type: DataType,
    key: &str,
    value: &Value,
    request: &Request,
) -> Result<Value, CommandError> {
    let ttl = request.ttl();

    match data_type {
        DataType::Str => {
            let text = match value {
                Value::Array(items) => joined(items),
                other => text_of(other),
            };
            store.strings_mut().add(key, text, ttl);
        }
        DataType::Num => {
            let number = to_number(first_arg(value)).ok_or(CommandError::InvalidNumber)?;
            store.numbers_mut().add(key, number, ttl);
        }
        DataType::Bool => {
            let number = to_number(first_arg(value)).ok_or(CommandError::InvalidBoolean)?;
            store.booleans_mut().add(key, number != 0.0, ttl);
        }
        DataType::Obj => {
            let object = match value {
                Value::Array(items) => serde_json::from_str(&joined(items))
                    .map_err(|_| CommandError::InvalidObject)?,
                other => other.clone(),
            };
            store.objects_mut().add(key, object, ttl);
        }
    }

    Ok(ok())
}

// ============================================================================
// TTL Commands
// ============================================================================

fn selector(arg: &Value) -> Result<DataType, CommandError> {
    Ok(text_of(arg).parse::<DataType>()?)
}

/// sttl key [selector, seconds]
fn cmd_sttl(store: &mut TypedStore, key: &str, value: &Value) -> Result<Value, CommandError> {
    let (target, secs) = match args_of(value) {
        [target, secs, ..] => (target, secs),
        _ => return Err(CommandError::InvalidTtl),
    };

    if text_of(target).is_empty() {
        return Err(CommandError::InvalidTtl);
    }
    let ttl = to_number(secs)
        .and_then(ttl_from_secs)
        .ok_or(CommandError::InvalidTtl)?;

    // An unrecognised selector is acknowledged without touching the store
    if let Ok(data_type) = selector(target) {
        store.set_ttl(data_type, key, ttl);
    }
    Ok(ok())
}

/// gttl key [selector]
fn cmd_gttl(store: &mut TypedStore, key: &str, value: &Value) -> Result<Value, CommandError> {
    let data_type = selector(first_arg(value))?;
    Ok(store
        .ttl(data_type, key)
        .map(|remaining| number_value(remaining.as_secs_f64()))
        .unwrap_or(Value::Null))
}

/// rmttl key [selector]
fn cmd_rmttl(store: &mut TypedStore, key: &str, value: &Value) -> Result<Value, CommandError> {
    let data_type = selector(first_arg(value))?;
    Ok(Value::Bool(store.remove_ttl(data_type, key)))
}
