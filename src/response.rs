//! Caller-facing reply values and RESP → [`Value`] conversion.
//!
//! [`into_value`] maps a wire reply onto a [`Value`]:
//! - Status → `Status`, Integer → `Int`, Null (any form) → `Nil`
//! - BulkString → `Text` when decoding is on and the bytes are UTF-8,
//!   otherwise `Bytes`
//! - VerbatimString → `Text` (encoding prefix dropped)
//! - Array / Set / Map / Push → the matching aggregate, converted recursively
//! - Attribute → the wrapped reply (attributes are dropped)
//! - a top-level error reply → `Err(RedisError::…)`; an error nested inside
//!   an aggregate → `Value::Error`

use bytes::Bytes;

use crate::error::{RedisError, Result, ServerError};
use crate::resp::types::RespValue;

/// A decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    /// Status reply such as `OK` or `PONG`.
    Status(String),
    Int(i64),
    /// Bulk string decoded as UTF-8.
    Text(String),
    /// Bulk string kept as raw bytes.
    Bytes(Bytes),
    Double(f64),
    Bool(bool),
    /// Arbitrary-precision integer, kept in its decimal form.
    BigNumber(String),
    Array(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Push { kind: String, data: Vec<Value> },
    /// An error reply nested inside an aggregate (e.g. one EXEC slot).
    Error(ServerError),
}

/// Convert a wire reply into a [`Value`].
///
/// `decode` turns UTF-8 bulk strings into `Text`; pass `false` for
/// binary-exact results.
pub fn into_value(resp: RespValue, decode: bool) -> Result<Value> {
    match resp {
        RespValue::Error(msg) | RespValue::BulkError(msg) => Err(RedisError::from_server(msg)),
        other => Ok(convert(other, decode)),
    }
}

fn convert(resp: RespValue, decode: bool) -> Value {
    match resp {
        RespValue::SimpleString(s) => Value::Status(s),
        RespValue::Error(msg) | RespValue::BulkError(msg) => Value::Error(ServerError::new(msg)),
        RespValue::Integer(i) => Value::Int(i),
        RespValue::BulkString(b) => bulk(b, decode),
        RespValue::Null => Value::Nil,
        RespValue::Double(d) => Value::Double(d),
        RespValue::Boolean(b) => Value::Bool(b),
        RespValue::BigNumber(s) => Value::BigNumber(s),
        RespValue::VerbatimString { data, .. } => Value::Text(data),
        RespValue::Array(items) => Value::Array(convert_all(items, decode)),
        RespValue::Set(items) => Value::Set(convert_all(items, decode)),
        RespValue::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (convert(k, decode), convert(v, decode)))
                .collect(),
        ),
        RespValue::Push { kind, data } => Value::Push {
            kind,
            data: convert_all(data, decode),
        },
        RespValue::Attribute { data, .. } => convert(*data, decode),
    }
}

fn convert_all(items: Vec<RespValue>, decode: bool) -> Vec<Value> {
    items.into_iter().map(|item| convert(item, decode)).collect()
}

fn bulk(b: Bytes, decode: bool) -> Value {
    if decode {
        if let Ok(s) = std::str::from_utf8(&b) {
            return Value::Text(s.to_owned());
        }
    }
    Value::Bytes(b)
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true for the status reply `OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Status(s) if s == "OK")
    }

    /// Text view of a status, text, or UTF-8 byte value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Status(s) | Self::Text(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Byte view of a string-like value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Status(s) | Self::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Integer view; numeric strings are parsed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Status(s) | Self::Text(s) | Self::BigNumber(s) => s.parse().ok(),
            Self::Bytes(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
            _ => None,
        }
    }

    /// Float view; numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            _ => self.as_str().and_then(|s| s.parse().ok()),
        }
    }

    /// Boolean view: RESP3 booleans, integers (non-zero is true), `OK`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Status(s) if s == "OK" => Some(true),
            _ => None,
        }
    }

    /// Elements of an array or set.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Result<Vec<Value>> {
        match self {
            Self::Array(items) | Self::Set(items) => Ok(items),
            other => Err(type_error("array", &other)),
        }
    }

    /// Key/value pairs of a RESP3 map, or of a flat RESP2 array
    /// `[k1, v1, k2, v2, …]`.
    pub fn into_pairs(self) -> Result<Vec<(Value, Value)>> {
        match self {
            Self::Map(pairs) => Ok(pairs),
            Self::Array(items) if items.len() % 2 == 0 => {
                let mut pairs = Vec::with_capacity(items.len() / 2);
                let mut it = items.into_iter();
                while let (Some(k), Some(v)) = (it.next(), it.next()) {
                    pairs.push((k, v));
                }
                Ok(pairs)
            }
            other => Err(type_error("map", &other)),
        }
    }

    pub fn into_bool(self) -> Result<bool> {
        self.as_bool().ok_or_else(|| type_error("boolean", &self))
    }

    pub fn into_int(self) -> Result<i64> {
        self.as_int().ok_or_else(|| type_error("integer", &self))
    }

    /// One boolean per element of an array reply. An error element fails
    /// the whole conversion.
    pub fn into_bools(self) -> Result<Vec<bool>> {
        self.into_array()?
            .into_iter()
            .map(|v| v.into_result()?.into_bool())
            .collect()
    }

    /// Raw bytes of a string-like value, `None` for nil.
    pub fn into_bytes(self) -> Result<Option<Bytes>> {
        match self {
            Self::Nil => Ok(None),
            Self::Bytes(b) => Ok(Some(b)),
            Self::Text(s) | Self::Status(s) => Ok(Some(Bytes::from(s))),
            other => Err(type_error("bytes", &other)),
        }
    }

    /// Nested error values surface as `Err`.
    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Error(e) => Err(RedisError::Response(e)),
            other => Ok(other),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Status(_) => "status",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::BigNumber(_) => "big_number",
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Push { .. } => "push",
            Self::Error(_) => "error",
        }
    }
}

fn type_error(expected: &str, got: &Value) -> RedisError {
    RedisError::Type(format!("expected {expected}, got {}", got.type_name()))
}

// ── Tests ──────────────────────────────────────────────────────────
