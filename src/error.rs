use std::fmt;
use std::io;

use thiserror::Error;

// ── Error taxonomy ─────────────────────────────────────────────────
//
//  RedisError
//  ├── Connection        (cannot establish or keep the transport)
//  ├── Timeout           (no response within bound)
//  ├── Authentication    (credentials rejected)
//  ├── Protocol          (malformed bytes, connection is desynchronized)
//  ├── Response          (server rejected the command)
//  │     └── ErrorKind: Err, WrongType, WrongNumberOfArgs, UnknownCommand,
//  │                    Module, ExecAbort, Loading, NoScript, ReadOnly,
//  │                    NoPerm, Busy, Other
//  ├── PoolExhausted     (no capacity within wait bound)
//  ├── PubSub            (misuse of a subscription channel)
//  ├── Watch             (transaction aborted by WATCH)
//  ├── Config            (invalid settings / URL)
//  └── Type              (reply had an unexpected shape)

/// Server-side error codes, selected from the first word of the message
/// (and, for generic `ERR`, from a few well-known message texts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic ERR
    Err,
    /// WRONGTYPE Operation against a key holding the wrong kind of value
    WrongType,
    /// ERR wrong number of arguments for '...' command
    WrongNumberOfArgs,
    /// ERR unknown command '...' (typically: module not loaded)
    UnknownCommand,
    /// ERR Error loading/unloading module ...
    Module,
    /// EXECABORT Transaction discarded because of previous errors
    ExecAbort,
    /// LOADING Redis is loading the dataset in memory
    Loading,
    /// NOSCRIPT No matching script
    NoScript,
    /// READONLY You can't write against a read only replica
    ReadOnly,
    /// NOPERM this user has no permissions to run the command
    NoPerm,
    /// BUSY Redis is busy running a script
    Busy,
    /// Any other error prefix
    Other(String),
}

const MODULE_ERRORS: &[&str] = &[
    "Error loading the extension.",
    "Error unloading module: no such module with that name",
    "Error unloading module: operation not possible.",
    "Error unloading module: the module exports one or more module-side data types",
];

impl ErrorKind {
    /// Classify a server error message (e.g. "WRONGTYPE Operation against…").
    pub fn from_error_msg(msg: &str) -> Self {
        let code = msg.split_whitespace().next().unwrap_or("UNKNOWN");
        match code {
            "ERR" => {
                let rest = msg.trim_start().strip_prefix("ERR").unwrap_or("").trim_start();
                if rest.starts_with("wrong number of arguments") {
                    Self::WrongNumberOfArgs
                } else if rest.starts_with("unknown command") {
                    Self::UnknownCommand
                } else if MODULE_ERRORS.iter().any(|m| rest.starts_with(m)) {
                    Self::Module
                } else {
                    Self::Err
                }
            }
            "WRONGTYPE" => Self::WrongType,
            "EXECABORT" => Self::ExecAbort,
            "LOADING" => Self::Loading,
            "NOSCRIPT" => Self::NoScript,
            "READONLY" => Self::ReadOnly,
            "NOPERM" => Self::NoPerm,
            "BUSY" => Self::Busy,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A command rejected by the server, with its diagnostic text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::from_error_msg(&message),
            message,
        }
    }

    /// The error code: the first word of the message.
    pub fn code(&self) -> &str {
        self.message.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// All error variants for redlink.
#[derive(Debug, Error)]
pub enum RedisError {
    /// TCP / IO level errors
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    /// Operation timed out
    #[error("timeout: {0}")]
    Timeout(String),
    /// Credentials rejected during the handshake or by AUTH
    #[error("authentication error: {0}")]
    Authentication(String),
    /// RESP protocol parse errors
    #[error("protocol error: {0}")]
    Protocol(String),
    /// RESP parser needs more data — not a real error, used as control flow.
    #[error("incomplete RESP message")]
    Incomplete,
    /// The server returned an error reply
    #[error("response error: {0}")]
    Response(ServerError),
    /// No pooled connection became available in time
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),
    /// Invalid use of a pub/sub channel
    #[error("pubsub error: {0}")]
    PubSub(String),
    /// MULTI/EXEC aborted because a watched key changed
    #[error("watch error: {0}")]
    Watch(String),
    /// Invalid configuration or URL
    #[error("config error: {0}")]
    Config(String),
    /// Reply conversion errors (e.g. expected int, got string)
    #[error("type error: {0}")]
    Type(String),
}

impl RedisError {
    /// Build the error for a server error reply.
    ///
    /// Most replies become [`RedisError::Response`]; credential rejections
    /// become [`RedisError::Authentication`] and the server refusing new
    /// clients becomes [`RedisError::Connection`].
    pub fn from_server(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if is_auth_error(&msg) {
            return Self::Authentication(msg);
        }
        if msg.starts_with("ERR max number of clients reached") {
            return Self::Connection(io::Error::new(io::ErrorKind::ConnectionRefused, msg));
        }
        Self::Response(ServerError::new(msg))
    }

    /// Shorthand for a `Connection` error with a custom kind.
    pub fn connection(kind: io::ErrorKind, msg: impl Into<String>) -> Self {
        Self::Connection(io::Error::new(kind, msg.into()))
    }

    /// The server error behind a `Response`, if any.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Response(e) => Some(e),
            _ => None,
        }
    }

    /// Server error kind, if this is a `Response`.
    pub fn kind(&self) -> Option<&ErrorKind> {
        self.server_error().map(|e| &e.kind)
    }

    /// Transport-level failure that may succeed on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Whether the executor may retry after this error.
    pub fn is_retryable(&self, retry_on_timeout: bool) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Timeout(_) => retry_on_timeout,
            _ => false,
        }
    }

    /// Whether the connection that produced this error must be discarded.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Protocol(_) | Self::Incomplete
        )
    }
}

fn is_auth_error(msg: &str) -> bool {
    if msg.starts_with("NOAUTH") || msg.starts_with("WRONGPASS") {
        return true;
    }
    let Some(rest) = msg.strip_prefix("ERR ") else {
        return false;
    };
    rest.starts_with("invalid password")
        || rest.starts_with("Client sent AUTH, but no password is set")
        || rest.starts_with("AUTH <password> called without any password configured")
        || rest
            .to_ascii_lowercase()
            .starts_with("wrong number of arguments for 'auth' command")
}

pub type Result<T> = std::result::Result<T, RedisError>;

// ── Tests ──────────────────────────────────────────────────────────
