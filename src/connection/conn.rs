//! A single connection to a Redis server.
//!
//! Owns the transport, a read buffer, and the connection state. The
//! connection tracks how many replies the server still owes it: a send that
//! was never matched by a receive (for example because the caller's future
//! was dropped mid-exchange) leaves the count non-zero, and such a connection
//! is never handed out again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::cmd::Command;
use crate::config::{ConnectionConfig, Protocol};
use crate::connection::stream::{self, BoxedTransport};
use crate::error::{ErrorKind, RedisError, Result};
use crate::resp::parser::{parse, resp_frame_len};
use crate::resp::types::RespValue;
use crate::resp::writer::{encode_command, encode_pipeline};

/// Initial read buffer capacity (64 KB).
const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    /// Desynchronized or failed; must be discarded.
    Broken,
}

pub struct Connection {
    id: u64,
    addr: String,
    transport: Option<BoxedTransport>,
    /// Data read from the transport but not yet consumed by the parser.
    buf: BytesMut,
    max_buf_size: usize,
    read_timeout: Option<Duration>,
    protocol: Protocol,
    state: ConnectionState,
    /// Replies sent for but not yet received.
    pending: usize,
    last_used: Instant,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Connection {
    /// Open a connection and run the handshake (auth, client name, db).
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut conn = Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            addr: config.addr(),
            transport: None,
            buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            max_buf_size: config.max_buffer_size,
            read_timeout: config.read_timeout,
            protocol: config.protocol,
            state: ConnectionState::Connecting,
            pending: 0,
            last_used: Instant::now(),
        };

        conn.transport = Some(stream::open(config).await?);
        debug!(conn = conn.id, addr = %conn.addr, "transport established");

        if let Err(e) = conn.handshake(config).await {
            warn!(conn = conn.id, addr = %conn.addr, error = %e, "handshake failed");
            conn.close().await;
            return Err(e);
        }
        conn.state = ConnectionState::Ready;
        debug!(conn = conn.id, protocol = ?conn.protocol, "connection ready");
        Ok(conn)
    }

    async fn handshake(&mut self, config: &ConnectionConfig) -> Result<()> {
        let password = config.password.as_deref();
        let mut authenticated = false;

        if config.protocol == Protocol::Resp3 {
            let mut hello = Command::new("HELLO").arg("3");
            if let Some(pass) = password {
                let user = config.username.as_deref().unwrap_or("default");
                hello = hello.arg("AUTH").arg(user).arg(pass);
            }
            if let Some(name) = &config.client_name {
                hello = hello.arg("SETNAME").arg(name);
            }
            match self.call(&hello).await? {
                RespValue::Error(msg) | RespValue::BulkError(msg) => {
                    let err = RedisError::from_server(msg);
                    // Servers before 6.0 have no HELLO; stay on RESP2.
                    if err.kind() != Some(&ErrorKind::UnknownCommand) {
                        return Err(err);
                    }
                    warn!(conn = self.id, "server does not support HELLO, using RESP2");
                    self.protocol = Protocol::Resp2;
                }
                _ => {
                    trace!(conn = self.id, "HELLO 3 accepted");
                    return self.select_db(config.db).await;
                }
            }
        }

        if let Some(pass) = password {
            let auth = match &config.username {
                Some(user) => Command::new("AUTH").arg(user).arg(pass),
                None => Command::new("AUTH").arg(pass),
            };
            let reply = self.call(&auth).await?;
            expect_ok(reply, "AUTH")?;
            authenticated = true;
        }

        if let Some(name) = &config.client_name {
            let reply = self
                .call(&Command::new("CLIENT").arg("SETNAME").arg(name))
                .await?;
            expect_ok(reply, "CLIENT SETNAME")?;
        }

        trace!(conn = self.id, authenticated, "RESP2 handshake done");
        self.select_db(config.db).await
    }

    async fn select_db(&mut self, db: u16) -> Result<()> {
        if db == 0 {
            return Ok(());
        }
        let reply = self.call(&Command::new("SELECT").arg(db)).await?;
        expect_ok(reply, "SELECT")
    }

    /// Send one command and receive its reply.
    pub async fn call(&mut self, cmd: &Command) -> Result<RespValue> {
        self.send_command(cmd).await?;
        self.receive().await
    }

    /// Write pre-encoded bytes that will produce `replies` replies.
    pub async fn send(&mut self, data: &[u8], replies: usize) -> Result<()> {
        let transport = self.transport.as_mut().ok_or_else(not_connected)?;
        // Counted before writing so a dropped write leaves the debt visible.
        self.pending += replies;
        if let Err(e) = transport.write_all(data).await {
            self.state = ConnectionState::Broken;
            return Err(e.into());
        }
        self.last_used = Instant::now();
        Ok(())
    }

    pub async fn send_command(&mut self, cmd: &Command) -> Result<()> {
        trace!(conn = self.id, cmd = %cmd.name(), "send");
        self.send(&encode_command(cmd), 1).await
    }

    /// Write a whole batch in a single write.
    pub async fn send_pipeline(&mut self, cmds: &[Command]) -> Result<()> {
        trace!(conn = self.id, len = cmds.len(), "send pipeline");
        self.send(&encode_pipeline(cmds), cmds.len()).await
    }

    /// Receive the next reply, bounded by the configured read timeout.
    ///
    /// RESP3 push messages that arrive in between are skipped. A timeout
    /// leaves the connection `Broken`: the late reply would desynchronize it.
    pub async fn receive(&mut self) -> Result<RespValue> {
        loop {
            let value = match self.read_timeout {
                Some(timeout) => {
                    let outcome = tokio::time::timeout(timeout, self.read_frame()).await;
                    match outcome {
                        Ok(result) => result?,
                        Err(_) => {
                            self.state = ConnectionState::Broken;
                            return Err(stream::read_timeout_error(&self.addr, timeout));
                        }
                    }
                }
                None => self.read_frame().await?,
            };
            if let RespValue::Push { kind, .. } = &value {
                trace!(conn = self.id, kind = %kind, "skipping out-of-band push");
                continue;
            }
            self.pending = self.pending.saturating_sub(1);
            return Ok(value);
        }
    }

    /// Receive the next frame of any kind, waiting at most `timeout`
    /// (`None` waits forever). Used in subscribed mode, where frames arrive
    /// unprompted; an elapsed wait returns `Ok(None)` and keeps the
    /// connection usable.
    pub async fn receive_message(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<RespValue>> {
        let value = match timeout {
            Some(t) => match tokio::time::timeout(t, self.read_frame()).await {
                Ok(result) => result?,
                Err(_) => return Ok(None),
            },
            None => self.read_frame().await?,
        };
        self.pending = self.pending.saturating_sub(1);
        Ok(Some(value))
    }

    /// Read and parse one complete frame.
    ///
    /// Cancel-safe: bytes already read stay in the buffer.
    async fn read_frame(&mut self) -> Result<RespValue> {
        let result = self.read_frame_inner().await;
        if let Err(e) = &result {
            if e.breaks_connection() {
                self.state = ConnectionState::Broken;
            }
        }
        result
    }

    async fn read_frame_inner(&mut self) -> Result<RespValue> {
        loop {
            if !self.buf.is_empty() {
                match resp_frame_len(&self.buf) {
                    Ok(len) => {
                        let frame = self.buf.split_to(len).freeze();
                        let (value, _) = parse(&frame)?;
                        self.last_used = Instant::now();
                        return Ok(value);
                    }
                    Err(RedisError::Incomplete) => {}
                    Err(e) => return Err(e),
                }
            }

            if self.buf.capacity() - self.buf.len() < 4096 {
                let new_cap = (self.buf.capacity() * 2).max(DEFAULT_BUF_CAPACITY);
                if new_cap > self.max_buf_size {
                    if self.buf.capacity() >= self.max_buf_size {
                        return Err(RedisError::Protocol(format!(
                            "reply too large: buffer would exceed {} bytes",
                            self.max_buf_size
                        )));
                    }
                    self.buf.reserve(self.max_buf_size - self.buf.capacity());
                } else {
                    self.buf.reserve(new_cap - self.buf.capacity());
                }
            }

            let transport = self.transport.as_mut().ok_or_else(not_connected)?;
            let n = transport.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(stream::closed_by_server());
            }
        }
    }

    /// Send PING and expect PONG.
    pub async fn ping(&mut self) -> Result<()> {
        match self.call(&Command::new("PING")).await? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            RespValue::Error(msg) => Err(RedisError::from_server(msg)),
            other => Err(RedisError::Protocol(format!(
                "unexpected PING reply: {}",
                other.type_name()
            ))),
        }
    }

    /// Shut the transport down. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.shutdown().await;
            debug!(conn = self.id, addr = %self.addr, "connection closed");
        }
        self.buf.clear();
        self.pending = 0;
        self.state = ConnectionState::Disconnected;
    }

    /// Ready, connected, and owed nothing.
    pub fn is_usable(&self) -> bool {
        self.state == ConnectionState::Ready && self.pending == 0 && self.transport.is_some()
    }

    pub fn mark_broken(&mut self) {
        self.state = ConnectionState::Broken;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Protocol actually in use (RESP3 may fall back to RESP2).
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn pending_replies(&self) -> usize {
        self.pending
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

fn not_connected() -> RedisError {
    RedisError::connection(std::io::ErrorKind::NotConnected, "connection is closed")
}

fn expect_ok(reply: RespValue, what: &str) -> Result<()> {
    match reply {
        RespValue::SimpleString(ref s) if s == "OK" => Ok(()),
        RespValue::Error(msg) | RespValue::BulkError(msg) => Err(RedisError::from_server(msg)),
        other => Err(RedisError::Protocol(format!(
            "unexpected {what} reply: {}",
            other.type_name()
        ))),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
