use bytes::Bytes;

/// A decoded server reply (RESP2 + RESP3).
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n  (status reply)
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n
    BulkString(Bytes),
    /// *2\r\n…
    Array(Vec<RespValue>),
    /// $-1\r\n  or  *-1\r\n  (RESP2), or _\r\n (RESP3)
    Null,
    /// ,3.14\r\n
    Double(f64),
    /// #t\r\n or #f\r\n
    Boolean(bool),
    /// %N\r\n…
    Map(Vec<(RespValue, RespValue)>),
    /// ~N\r\n…
    Set(Vec<RespValue>),
    /// =15\r\ntxt:Some string\r\n
    VerbatimString { encoding: String, data: String },
    /// (3492890328409238509324850943850943825024385\r\n
    BigNumber(String),
    /// !21\r\nSYNTAX invalid syntax\r\n
    BulkError(String),
    /// >N\r\n…  (out-of-band push, e.g. pub/sub messages under RESP3)
    Push { kind: String, data: Vec<RespValue> },
    /// |N\r\n…  (attributes preceding the actual reply)
    Attribute {
        data: Box<RespValue>,
        attributes: Vec<(RespValue, RespValue)>,
    },
}

impl RespValue {
    /// Build a bulk string from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Self::BulkString(data.into())
    }

    /// Build a status reply.
    pub fn status(s: impl Into<String>) -> Self {
        Self::SimpleString(s.into())
    }

    /// Interpret as UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::SimpleString(s) => Some(s),
            Self::BulkString(b) => std::str::from_utf8(b).ok(),
            Self::VerbatimString { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Interpret as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::BulkString(b) => Some(b),
            Self::SimpleString(s) => Some(s.as_bytes()),
            Self::VerbatimString { data, .. } => Some(data.as_bytes()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of any sequence-shaped reply (array, set, push payload).
    pub fn into_sequence(self) -> Option<Vec<RespValue>> {
        match self {
            Self::Array(a) | Self::Set(a) => Some(a),
            Self::Push { kind, mut data } => {
                data.insert(0, Self::BulkString(Bytes::from(kind)));
                Some(data)
            }
            _ => None,
        }
    }

    /// Strip any attribute wrapper and return the actual reply.
    pub fn without_attributes(self) -> Self {
        match self {
            Self::Attribute { data, .. } => data.without_attributes(),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Simple or bulk error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_) | Self::BulkError(_))
    }

    pub fn as_error_msg(&self) -> Option<&str> {
        match self {
            Self::Error(msg) | Self::BulkError(msg) => Some(msg),
            _ => None,
        }
    }

    /// Returns true for the status reply `+OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::SimpleString(s) if s == "OK")
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple_string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BulkString(_) => "bulk_string",
            Self::Array(_) => "array",
            Self::Null => "null",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::VerbatimString { .. } => "verbatim_string",
            Self::BigNumber(_) => "big_number",
            Self::BulkError(_) => "bulk_error",
            Self::Push { .. } => "push",
            Self::Attribute { .. } => "attribute",
        }
    }
}

impl From<&str> for RespValue {
    fn from(s: &str) -> Self {
        Self::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<i64> for RespValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
