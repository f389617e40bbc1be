//! Connection configuration and URL parsing.
//!
//! Supports the following URL schemes:
//! - `redis://[user:pass@]host[:port][/db][?query]`      — TCP
//! - `rediss://[user:pass@]host[:port][/db][?query]`     — TCP + TLS
//! - `unix:///path/to/socket[?query]`                    — Unix domain socket
//! - `redis+unix:///path/to/socket[?query]`              — same as `unix://`
//!
//! Recognised query parameters: `db`, `password`, `username`, `timeout`
//! (seconds, applied to connect and read), `protocol` (`2` or `3`),
//! `client_name`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RedisError, Result};

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default maximum read buffer size (512 MiB + headroom for one max bulk).
pub const DEFAULT_MAX_BUF_SIZE: usize = 640 * 1024 * 1024;

/// Wire protocol negotiated during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Resp2,
    /// Negotiated with `HELLO 3`.
    Resp3,
}

/// What `acquire` does when every connection is checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    /// Fail immediately with `PoolExhausted`.
    NonBlocking,
    /// Wait up to `timeout` for a release, then `PoolExhausted`.
    Blocking { timeout: Duration },
}

impl Default for PoolMode {
    fn default() -> Self {
        Self::Blocking {
            timeout: Duration::from_secs(20),
        }
    }
}

/// Commands that are safe to send twice.
///
/// A command that may have reached the server is only re-sent after a
/// transport failure if it is listed here (or the caller opts in).
pub const DEFAULT_IDEMPOTENT_COMMANDS: &[&str] = &[
    "PING",
    "ECHO",
    "GET",
    "MGET",
    "EXISTS",
    "TTL",
    "PTTL",
    "TYPE",
    "STRLEN",
    "HGET",
    "HGETALL",
    "HMGET",
    "HEXISTS",
    "HLEN",
    "LLEN",
    "LRANGE",
    "LINDEX",
    "SCARD",
    "SISMEMBER",
    "SMEMBERS",
    "ZCARD",
    "ZSCORE",
    "ZRANGE",
    "DBSIZE",
    "INFO",
    "SELECT",
    "SET",
    "DEL",
    "UNLINK",
    "EXPIRE",
    "PEXPIRE",
    "BF.EXISTS",
    "BF.MEXISTS",
    "BF.INFO",
    "BF.CARD",
    "BF.SCANDUMP",
    "BF.LOADCHUNK",
];

/// How the executor retries transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one (0 disables retrying).
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
    /// Whether a `Timeout` counts as retryable.
    pub retry_on_timeout: bool,
    /// Upper-case command names that may be re-sent after a partial exchange.
    pub idempotent_commands: HashSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
            retry_on_timeout: true,
            idempotent_commands: DEFAULT_IDEMPOTENT_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    pub fn is_idempotent(&self, name: &str) -> bool {
        self.idempotent_commands.contains(name)
    }
}

/// Full connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host (ignored when `unix_path` is set).
    pub host: String,
    pub port: u16,
    /// Unix domain socket path; takes precedence over host/port.
    pub unix_path: Option<PathBuf>,
    /// Optional username (Redis 6+ ACL).
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index selected after connecting.
    pub db: u16,
    /// Sent as `CLIENT SETNAME` (or in `HELLO`).
    pub client_name: Option<String>,
    /// Whether to wrap TCP in TLS (requires the `tls` feature).
    pub tls: bool,
    pub protocol: Protocol,
    /// Maximum number of live connections.
    pub pool_size: usize,
    pub pool_mode: PoolMode,
    /// Connections opened eagerly by `ConnectionPool::warm`.
    pub min_idle: usize,
    pub connect_timeout: Duration,
    /// Per-reply read bound. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Idle connections older than this are dropped instead of reused.
    pub idle_timeout: Option<Duration>,
    /// Idle connections older than this are pinged before reuse.
    pub health_check_interval: Option<Duration>,
    /// Maximum read buffer size per connection in bytes.
    pub max_buffer_size: usize,
    /// Decode bulk strings to text when they are valid UTF-8.
    pub decode_responses: bool,
    pub retry: RetryPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            unix_path: None,
            username: None,
            password: None,
            db: 0,
            client_name: None,
            tls: false,
            protocol: Protocol::Resp2,
            pool_size: 8,
            pool_mode: PoolMode::default(),
            min_idle: 0,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_secs(30)),
            idle_timeout: Some(Duration::from_secs(300)),
            health_check_interval: None,
            max_buffer_size: DEFAULT_MAX_BUF_SIZE,
            decode_responses: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Parse a Redis URL into a ConnectionConfig.
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| RedisError::Config(format!("invalid URL, missing ://: {url}")))?;

        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q)),
            None => (rest, None),
        };

        match scheme {
            "redis" => parse_tcp_url(&mut config, rest)?,
            "rediss" => {
                config.tls = true;
                parse_tcp_url(&mut config, rest)?;
            }
            "unix" | "redis+unix" => parse_unix_url(&mut config, rest)?,
            _ => {
                return Err(RedisError::Config(format!("unknown URL scheme: {scheme}")));
            }
        }

        if let Some(query) = query {
            apply_query(&mut config, query)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no connection could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(RedisError::Config("pool_size must be at least 1".into()));
        }
        if self.min_idle > self.pool_size {
            return Err(RedisError::Config(format!(
                "min_idle ({}) exceeds pool_size ({})",
                self.min_idle, self.pool_size
            )));
        }
        if self.tls && self.unix_path.is_some() {
            return Err(RedisError::Config("TLS over a unix socket is not supported".into()));
        }
        if self.username.is_some() && self.password.is_none() {
            return Err(RedisError::Config("username given without a password".into()));
        }
        Ok(())
    }

    /// Human-readable address, used in logs and error messages.
    pub fn addr(&self) -> String {
        match &self.unix_path {
            Some(path) => format!("unix:{}", path.display()),
            None if self.host.contains(':') => format!("[{}]:{}", self.host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

/// Parse `[user:pass@]host[:port][/db]`
fn parse_tcp_url(config: &mut ConnectionConfig, rest: &str) -> Result<()> {
    let (host_part, db_part) = split_path(rest);

    if let Some(db_str) = db_part {
        config.db = parse_db(db_str)?;
    }

    let host_port = if let Some((userinfo, hp)) = host_part.rsplit_once('@') {
        parse_userinfo(config, userinfo)?;
        hp
    } else {
        host_part
    };

    parse_host_port(host_port, DEFAULT_PORT, &mut config.host, &mut config.port)
}

/// Parse `[user:pass@]/path/to/socket`
fn parse_unix_url(config: &mut ConnectionConfig, rest: &str) -> Result<()> {
    let path = match rest.split_once('@') {
        Some((userinfo, path)) if !userinfo.contains('/') => {
            parse_userinfo(config, userinfo)?;
            path
        }
        _ => rest,
    };
    if path.is_empty() {
        return Err(RedisError::Config("unix URL has no socket path".into()));
    }
    config.unix_path = Some(PathBuf::from(percent_decode(path)?));
    Ok(())
}

// ── URL parsing helpers ────────────────────────────────────────────

/// Split `rest` into (before_path, Some(path)) or (rest, None).
fn split_path(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((before, after)) if !after.is_empty() => (before, Some(after)),
        Some((before, _)) => (before, None),
        None => (rest, None),
    }
}

fn parse_db(s: &str) -> Result<u16> {
    s.parse()
        .map_err(|_| RedisError::Config(format!("invalid db number: {s}")))
}

/// Parse `user:pass` or `:pass` into config.
fn parse_userinfo(config: &mut ConnectionConfig, userinfo: &str) -> Result<()> {
    match userinfo.split_once(':') {
        Some((user, pass)) => {
            if !user.is_empty() {
                config.username = Some(percent_decode(user)?);
            }
            if !pass.is_empty() {
                config.password = Some(percent_decode(pass)?);
            }
        }
        None => {
            if !userinfo.is_empty() {
                config.password = Some(percent_decode(userinfo)?);
            }
        }
    }
    Ok(())
}

/// Parse `host[:port]` or `[ipv6]:port` into host/port variables.
fn parse_host_port(s: &str, default_port: u16, host: &mut String, port: &mut u16) -> Result<()> {
    if s.starts_with('[') {
        let close = s
            .find(']')
            .ok_or_else(|| RedisError::Config(format!("unclosed IPv6 bracket: {s}")))?;
        *host = s[1..close].to_string();
        let after = &s[close + 1..];
        if let Some(port_str) = after.strip_prefix(':') {
            *port = port_str
                .parse()
                .map_err(|_| RedisError::Config(format!("invalid port: {port_str}")))?;
        } else {
            *port = default_port;
        }
    } else if let Some((h, p)) = s.rsplit_once(':') {
        match p.parse::<u16>() {
            Ok(parsed_port) => {
                *host = h.to_string();
                *port = parsed_port;
            }
            // Bare IPv6 without brackets.
            Err(_) if h.contains(':') => {
                *host = s.to_string();
                *port = default_port;
            }
            Err(_) => return Err(RedisError::Config(format!("invalid port: {p}"))),
        }
    } else {
        *host = s.to_string();
        *port = default_port;
    }

    if host.is_empty() {
        *host = "127.0.0.1".to_string();
    }

    Ok(())
}

fn apply_query(config: &mut ConnectionConfig, query: &str) -> Result<()> {
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode(value)?;
        match key {
            "db" => config.db = parse_db(&value)?,
            "password" => config.password = Some(value),
            "username" => config.username = Some(value),
            "client_name" => config.client_name = Some(value),
            "timeout" => {
                let timeout = value
                    .parse::<f64>()
                    .ok()
                    .filter(|s| *s > 0.0)
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or_else(|| RedisError::Config(format!("invalid timeout: {value}")))?;
                config.connect_timeout = timeout;
                config.read_timeout = Some(timeout);
            }
            "protocol" => {
                config.protocol = match value.as_str() {
                    "2" => Protocol::Resp2,
                    "3" => Protocol::Resp3,
                    other => {
                        return Err(RedisError::Config(format!("invalid protocol: {other}")));
                    }
                }
            }
            other => {
                return Err(RedisError::Config(format!("unknown URL parameter: {other}")));
            }
        }
    }
    Ok(())
}

/// Decode `%XX` escapes (userinfo and query values may carry them).
fn percent_decode(s: &str) -> Result<String> {
    if !s.contains('%') {
        return Ok(s.to_string());
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| RedisError::Config(format!("invalid percent escape in {s:?}")))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| RedisError::Config(format!("invalid UTF-8 in {s:?}")))
}

// ── Tests ──────────────────────────────────────────────────────────
