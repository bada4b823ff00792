//! Request Envelope
//!
//! Every request is one JSON object:
//!
//! ```json
//! { "event": "nset", "key": "hits", "value": "5", "ttl": 60 }
//! ```
//!
//! `value` is usually a string or an array of strings, but any JSON value is
//! accepted and coerced where a number or text is needed. This module turns
//! the raw text into a [`Request`] and the `event` into a [`Command`].

use crate::commands::CommandError;
use crate::storage::DataType;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// The decoded JSON envelope.
///
/// All fields are optional at this stage; a JSON `null` counts as absent.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Request {
    pub event: Option<Value>,
    pub key: Option<Value>,
    pub value: Option<Value>,
    pub ttl: Option<Value>,
}

impl Request {
    /// Parses a request from text.
    ///
    /// Invalid JSON and a bare `null` are malformed. Any other non-object
    /// document parses to an empty request, which then fails for lack of a key.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let document: Value =
            serde_json::from_str(text.trim()).map_err(|_| CommandError::MalformedJson)?;

        match document {
            Value::Null => Err(CommandError::MalformedJson),
            Value::Object(_) => {
                serde_json::from_value(document).map_err(|_| CommandError::MalformedJson)
            }
            _ => Ok(Request::default()),
        }
    }

    /// The key as text. Non-string keys use their JSON text.
    pub fn key(&self) -> Option<String> {
        self.key.as_ref().map(text_of)
    }

    /// The `ttl` field as a duration for newly created keys.
    ///
    /// Zero or non-numeric means no expiry. A negative TTL yields a zero
    /// duration, so the key is created already expired.
    pub fn ttl(&self) -> Option<Duration> {
        let secs = self.ttl.as_ref().and_then(to_number)?;
        if secs == 0.0 {
            return None;
        }
        ttl_from_secs(secs)
    }
}

/// A dispatched operation, decoded from `event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(DataType),
    Set(DataType),
    Delete(DataType),
    Incr,
    SetTtl,
    GetTtl,
    RemoveTtl,
    /// Anything else, carrying the event as it should be echoed back
    Unknown(String),
}

impl Command {
    pub fn parse(event: Option<&Value>) -> Self {
        let name = match event {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => return Command::Unknown(other.to_string()),
            None => return Command::Unknown("undefined".to_string()),
        };

        match name {
            "sget" => Command::Get(DataType::Str),
            "nget" => Command::Get(DataType::Num),
            "bget" => Command::Get(DataType::Bool),
            "oget" => Command::Get(DataType::Obj),
            "sset" => Command::Set(DataType::Str),
            "nset" => Command::Set(DataType::Num),
            "bset" => Command::Set(DataType::Bool),
            "oset" => Command::Set(DataType::Obj),
            "sdel" => Command::Delete(DataType::Str),
            "ndel" => Command::Delete(DataType::Num),
            "bdel" => Command::Delete(DataType::Bool),
            "odel" => Command::Delete(DataType::Obj),
            "incr" => Command::Incr,
            "sttl" => Command::SetTtl,
            "gttl" => Command::GetTtl,
            "rmttl" => Command::RemoveTtl,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Whether the command needs a non-empty `value`.
    ///
    /// Unknown events fall on the value-requiring side, so a request with
    /// neither a known event nor a value reports the missing value first.
    pub fn requires_value(&self) -> bool {
        !matches!(self, Command::Get(_) | Command::Delete(_) | Command::Incr)
    }
}

/// True for `""` and `[]`.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// The value as text: strings verbatim, `null` as empty, anything else as JSON.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Array elements joined by single spaces.
pub fn joined(items: &[Value]) -> String {
    items.iter().map(text_of).collect::<Vec<_>>().join(" ")
}

/// The positional arguments carried by `value`.
///
/// An array is its own element list; any other value is a single argument.
pub fn args_of(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// The first positional argument, or the value itself when it is an empty array.
pub fn first_arg(value: &Value) -> &Value {
    args_of(value).first().unwrap_or(value)
}

/// Coerces a JSON value to a number.
///
/// Strings are trimmed; the empty string is 0. Decimal, exponent, `0x` hex
/// and `Infinity` forms are accepted. Booleans are 1 or 0, `null` is 0, a
/// single-element array is its element. Returns None for everything else,
/// including NaN.
pub fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single)?,
            _ => return None,
        },
        Value::Object(_) => return None,
    };

    (!number.is_nan()).then_some(number)
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0.0);
    }

    let (sign, unsigned) = match text.as_bytes()[0] {
        b'-' => (-1.0, &text[1..]),
        b'+' => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    if unsigned == "Infinity" {
        return Some(sign * f64::INFINITY);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }

    // Rust accepts "inf" and "nan" spellings that are not numbers here
    let plain = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !plain {
        return None;
    }
    text.parse().ok()
}

/// Converts seconds to a TTL. Negative values clamp to zero; values too
/// large for a `Duration` give None.
pub fn ttl_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs.max(0.0)).ok()
}

/// Encodes a number the way it should appear in a response.
///
/// Integral values print without a fractional part; NaN and infinities
/// become `null`.
pub fn number_value(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object() {
        let request =
            Request::parse(r#"  {"event":"sset","key":"a","value":["x","y"],"ttl":5}  "#).unwrap();
        assert_eq!(request.event, Some(json!("sset")));
        assert_eq!(request.key(), Some("a".to_string()));
        assert_eq!(request.value, Some(json!(["x", "y"])));
        assert_eq!(request.ttl(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(Request::parse("{bad"), Err(CommandError::MalformedJson));
        assert_eq!(Request::parse(""), Err(CommandError::MalformedJson));
        assert_eq!(Request::parse("null"), Err(CommandError::MalformedJson));
    }

    #[test]
    fn test_parse_non_object_has_no_key() {
        for text in ["5", "\"text\"", "[1,2]", "true"] {
            let request = Request::parse(text).unwrap();
            assert_eq!(request.key(), None, "document {}", text);
        }
    }

    #[test]
    fn test_null_fields_are_absent() {
        let request = Request::parse(r#"{"event":"sget","key":null,"value":null}"#).unwrap();
        assert_eq!(request.key(), None);
        assert_eq!(request.value, None);
    }

    #[test]
    fn test_non_string_key() {
        let request = Request::parse(r#"{"key":42}"#).unwrap();
        assert_eq!(request.key(), Some("42".to_string()));
    }

    #[test]
    fn test_request_ttl() {
        let ttl = |text: &str| Request::parse(text).unwrap().ttl();
        assert_eq!(ttl(r#"{"ttl":0}"#), None);
        assert_eq!(ttl(r#"{"ttl":"abc"}"#), None);
        assert_eq!(ttl(r#"{"ttl":"2"}"#), Some(Duration::from_secs(2)));
        assert_eq!(ttl(r#"{"ttl":0.5}"#), Some(Duration::from_millis(500)));
        assert_eq!(ttl(r#"{"ttl":-3}"#), Some(Duration::ZERO));
        assert_eq!(ttl(r#"{}"#), None);
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse(Some(&json!("nget"))), Command::Get(DataType::Num));
        assert_eq!(Command::parse(Some(&json!("oset"))), Command::Set(DataType::Obj));
        assert_eq!(Command::parse(Some(&json!("bdel"))), Command::Delete(DataType::Bool));
        assert_eq!(Command::parse(Some(&json!("rmttl"))), Command::RemoveTtl);
        assert_eq!(
            Command::parse(Some(&json!("SGET"))),
            Command::Unknown("SGET".to_string())
        );
        assert_eq!(Command::parse(Some(&json!(7))), Command::Unknown("7".to_string()));
        assert_eq!(Command::parse(None), Command::Unknown("undefined".to_string()));
    }

    #[test]
    fn test_requires_value() {
        assert!(!Command::Get(DataType::Str).requires_value());
        assert!(!Command::Delete(DataType::Obj).requires_value());
        assert!(!Command::Incr.requires_value());
        assert!(Command::Set(DataType::Num).requires_value());
        assert!(Command::GetTtl.requires_value());
        assert!(Command::Unknown("x".to_string()).requires_value());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!("  42 ")), Some(42.0));
        assert_eq!(to_number(&json!("-1.5e2")), Some(-150.0));
        assert_eq!(to_number(&json!("0x1f")), Some(31.0));
        assert_eq!(to_number(&json!("")), Some(0.0));
        assert_eq!(to_number(&json!("-Infinity")), Some(f64::NEG_INFINITY));
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!(["7"])), Some(7.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!("inf")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(["1", "2"])), None);
        assert_eq!(to_number(&json!({"a": 1})), None);
    }

    #[test]
    fn test_args() {
        let value = json!(["num", "10"]);
        assert_eq!(args_of(&value).len(), 2);
        assert_eq!(first_arg(&value), &json!("num"));

        let value = json!("str");
        assert_eq!(args_of(&value), &[json!("str")]);
        assert_eq!(first_arg(&value), &json!("str"));
    }

    #[test]
    fn test_joined() {
        assert_eq!(joined(&[json!("hello"), json!("world")]), "hello world");
        assert_eq!(joined(&[json!("{\"a\":"), json!(1), json!("}")]), "{\"a\": 1 }");
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(8.0).to_string(), "8");
        assert_eq!(number_value(-2.0).to_string(), "-2");
        assert_eq!(number_value(7.5).to_string(), "7.5");
        assert_eq!(number_value(f64::INFINITY), Value::Null);
    }
}
