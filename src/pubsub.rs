//! Publish/subscribe channel.
//!
//! A [`PubSub`] holds a dedicated pooled connection while it has active
//! subscriptions. Subscription commands wait for their confirmations; data
//! messages that arrive in the meantime are queued and handed out by
//! [`PubSub::next_message`] in arrival order.
//!
//! Both the RESP2 form (arrays) and the RESP3 form (push frames) of
//! subscription traffic are understood.
//!
//! Losing the connection clears every subscription and returns the channel
//! to the idle state; nothing is re-subscribed automatically.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{self, Stream};
use tracing::{debug, trace, warn};

use crate::cmd::Command;
use crate::connection::pool::{ConnectionPool, PooledConnection};
use crate::error::{RedisError, Result};
use crate::resp::types::RespValue;
use crate::resp::writer::encode_command;
use crate::response::{into_value, Value};

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub channel: String,
    /// The matching pattern, for messages delivered through `PSUBSCRIBE`.
    pub pattern: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubSubState {
    Idle,
    Subscribed,
}

/// One frame of subscription traffic.
enum Frame {
    Message(Message),
    /// `(p)(un)subscribe` confirmation: kind, channel, remaining count.
    Confirm {
        kind: String,
        channel: Option<String>,
        remaining: i64,
    },
    Pong,
}

pub struct PubSub {
    pool: ConnectionPool,
    conn: Option<PooledConnection>,
    channels: HashSet<String>,
    patterns: HashSet<String>,
    queued: VecDeque<Message>,
    decode: bool,
}

impl PubSub {
    pub(crate) fn new(pool: ConnectionPool) -> Self {
        let decode = pool.config().decode_responses;
        Self {
            pool,
            conn: None,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            queued: VecDeque::new(),
            decode,
        }
    }

    pub fn state(&self) -> PubSubState {
        if self.channels.is_empty() && self.patterns.is_empty() {
            PubSubState::Idle
        } else {
            PubSubState::Subscribed
        }
    }

    pub fn channels(&self) -> &HashSet<String> {
        &self.channels
    }

    pub fn patterns(&self) -> &HashSet<String> {
        &self.patterns
    }

    pub async fn subscribe(&mut self, channels: &[&str]) -> Result<()> {
        self.change("SUBSCRIBE", channels).await
    }

    pub async fn psubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        self.change("PSUBSCRIBE", patterns).await
    }

    /// Unsubscribe from `channels`, or from every channel if empty.
    pub async fn unsubscribe(&mut self, channels: &[&str]) -> Result<()> {
        self.change("UNSUBSCRIBE", channels).await
    }

    /// Unsubscribe from `patterns`, or from every pattern if empty.
    pub async fn punsubscribe(&mut self, patterns: &[&str]) -> Result<()> {
        self.change("PUNSUBSCRIBE", patterns).await
    }

    async fn change(&mut self, verb: &'static str, names: &[&str]) -> Result<()> {
        let subscribing = verb == "SUBSCRIBE" || verb == "PSUBSCRIBE";
        if subscribing && names.is_empty() {
            return Err(RedisError::PubSub(format!("{verb} needs at least one name")));
        }
        if !subscribing && self.conn.is_none() {
            return Ok(());
        }

        let expected = if !names.is_empty() {
            names.len()
        } else if verb == "UNSUBSCRIBE" {
            self.channels.len().max(1)
        } else {
            self.patterns.len().max(1)
        };

        let result = self.change_inner(verb, names, expected).await;
        if let Err(e) = &result {
            self.lose_connection(e);
        }
        self.release_if_idle();
        result
    }

    async fn change_inner(&mut self, verb: &'static str, names: &[&str], expected: usize) -> Result<()> {
        if self.conn.is_none() {
            self.conn = Some(self.pool.acquire().await?);
            debug!(verb, "pubsub connection acquired");
        }
        let confirm_kind = verb.to_ascii_lowercase();
        let cmd = Command::new(verb).args(names.iter().copied());
        let wait = self.pool.config().read_timeout;

        // Confirmations are consumed below, not counted as owed replies.
        self.connection()?.send(&encode_command(&cmd), 0).await?;

        let mut confirmed = 0;
        let deadline = wait.map(|w| Instant::now() + w);
        while confirmed < expected {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let frame = self.read_frame(remaining).await?.ok_or_else(|| {
                RedisError::Timeout(format!("no {confirm_kind} confirmation in time"))
            })?;
            match frame {
                Frame::Confirm {
                    kind,
                    channel,
                    remaining,
                } => {
                    trace!(kind = %kind, remaining, "subscription confirmed");
                    self.apply_confirm(&kind, channel);
                    if kind == confirm_kind {
                        confirmed += 1;
                    }
                }
                Frame::Message(msg) => self.queued.push_back(msg),
                Frame::Pong => {}
            }
        }
        trace!(verb, channels = self.channels.len(), patterns = self.patterns.len(), "subscriptions updated");
        Ok(())
    }

    /// Wait for the next data message.
    pub async fn next_message(&mut self) -> Result<Message> {
        match self.wait_message(None).await? {
            Some(msg) => Ok(msg),
            None => Err(RedisError::PubSub("message stream ended".into())),
        }
    }

    /// Wait at most `timeout` for the next data message.
    pub async fn get_message(&mut self, timeout: Duration) -> Result<Option<Message>> {
        self.wait_message(Some(timeout)).await
    }

    async fn wait_message(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        if let Some(msg) = self.queued.pop_front() {
            return Ok(Some(msg));
        }
        if self.conn.is_none() {
            return Err(RedisError::PubSub("not subscribed to any channel".into()));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let frame = match self.read_frame(remaining).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(None),
                Err(e) => {
                    self.lose_connection(&e);
                    return Err(e);
                }
            };
            match frame {
                Frame::Message(msg) => return Ok(Some(msg)),
                Frame::Confirm { kind, channel, .. } => {
                    self.apply_confirm(&kind, channel);
                    if self.state() == PubSubState::Idle {
                        self.release_if_idle();
                        return Err(RedisError::PubSub("all subscriptions were removed".into()));
                    }
                }
                Frame::Pong => {}
            }
        }
    }

    /// Infinite stream of messages. Ends after yielding the first error.
    pub fn listen(&mut self) -> impl Stream<Item = Result<Message>> + '_ {
        stream::unfold(Some(self), |state| async move {
            let pubsub = state?;
            match pubsub.next_message().await {
                Ok(msg) => Some((Ok(msg), Some(pubsub))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// PING while subscribed; data messages that arrive first are queued.
    pub async fn ping(&mut self) -> Result<()> {
        let result = self.ping_inner().await;
        if let Err(e) = &result {
            self.lose_connection(e);
        }
        result
    }

    async fn ping_inner(&mut self) -> Result<()> {
        let wire = encode_command(&Command::new("PING"));
        self.connection()?.send(&wire, 0).await?;
        let wait = self.pool.config().read_timeout;
        loop {
            match self.read_frame(wait).await? {
                Some(Frame::Pong) => return Ok(()),
                Some(Frame::Message(msg)) => self.queued.push_back(msg),
                Some(Frame::Confirm { kind, channel, .. }) => self.apply_confirm(&kind, channel),
                None => return Err(RedisError::Timeout("no PONG while subscribed".into())),
            }
        }
    }

    /// Unsubscribe from everything and discard the connection.
    pub async fn close(&mut self) {
        if self.conn.is_some() {
            if !self.channels.is_empty() {
                let _ = self.unsubscribe(&[]).await;
            }
            if !self.patterns.is_empty() {
                let _ = self.punsubscribe(&[]).await;
            }
        }
        self.channels.clear();
        self.patterns.clear();
        self.queued.clear();
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            conn.discard();
        }
    }

    fn connection(&mut self) -> Result<&mut PooledConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| RedisError::PubSub("not subscribed to any channel".into()))
    }

    async fn read_frame(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>> {
        loop {
            let conn = self.connection()?;
            let Some(resp) = conn.receive_message(timeout).await? else {
                return Ok(None);
            };
            if let Some(frame) = classify(resp, self.decode)? {
                return Ok(Some(frame));
            }
        }
    }

    fn apply_confirm(&mut self, kind: &str, channel: Option<String>) {
        let Some(channel) = channel else { return };
        match kind {
            "subscribe" => {
                self.channels.insert(channel);
            }
            "psubscribe" => {
                self.patterns.insert(channel);
            }
            "unsubscribe" => {
                self.channels.remove(&channel);
            }
            "punsubscribe" => {
                self.patterns.remove(&channel);
            }
            _ => {}
        }
    }

    fn lose_connection(&mut self, err: &RedisError) {
        if let Some(conn) = self.conn.take() {
            warn!(error = %err, channels = self.channels.len(), "pubsub connection lost");
            conn.discard();
        }
        self.channels.clear();
        self.patterns.clear();
    }

    /// With nothing subscribed the connection is closed instead of kept.
    fn release_if_idle(&mut self) {
        if self.state() == PubSubState::Idle {
            if let Some(conn) = self.conn.take() {
                debug!("no subscriptions left, releasing pubsub connection");
                conn.discard();
            }
        }
    }
}

impl Drop for PubSub {
    fn drop(&mut self) {
        // A subscribed connection must never go back to the idle set.
        if let Some(conn) = self.conn.take() {
            conn.discard();
        }
    }
}

fn classify(resp: RespValue, decode: bool) -> Result<Option<Frame>> {
    let resp = resp.without_attributes();
    if let RespValue::SimpleString(s) = &resp {
        if s.eq_ignore_ascii_case("PONG") {
            return Ok(Some(Frame::Pong));
        }
    }
    if let Some(msg) = resp.as_error_msg() {
        return Err(RedisError::from_server(msg));
    }
    let Some(items) = resp.into_sequence() else {
        return Ok(None);
    };
    let mut items = items.into_iter();
    let Some(kind) = items.next().and_then(|k| text(&k)) else {
        return Ok(None);
    };

    let frame = match kind.as_str() {
        "message" | "smessage" => {
            let (Some(channel), Some(payload)) = (items.next(), items.next()) else {
                return Err(malformed(&kind));
            };
            Frame::Message(Message {
                channel: text(&channel).ok_or_else(|| malformed(&kind))?,
                pattern: None,
                payload: into_value(payload, decode)?,
            })
        }
        "pmessage" => {
            let (Some(pattern), Some(channel), Some(payload)) =
                (items.next(), items.next(), items.next())
            else {
                return Err(malformed(&kind));
            };
            Frame::Message(Message {
                channel: text(&channel).ok_or_else(|| malformed(&kind))?,
                pattern: text(&pattern),
                payload: into_value(payload, decode)?,
            })
        }
        "subscribe" | "psubscribe" | "unsubscribe" | "punsubscribe" => {
            let channel = items.next().and_then(|c| text(&c));
            let remaining = items.next().and_then(|c| c.as_int()).unwrap_or(0);
            Frame::Confirm {
                kind,
                channel,
                remaining,
            }
        }
        "pong" => Frame::Pong,
        other => {
            trace!(kind = other, "ignoring unexpected pubsub frame");
            return Ok(None);
        }
    };
    Ok(Some(frame))
}

fn text(v: &RespValue) -> Option<String> {
    match v {
        RespValue::BulkString(b) => Some(String::from_utf8_lossy(b).into_owned()),
        RespValue::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn malformed(kind: &str) -> RedisError {
    RedisError::Protocol(format!("malformed {kind} frame"))
}

impl Message {
    /// Payload bytes, whatever the decode setting.
    pub fn payload_bytes(&self) -> Option<Bytes> {
        self.payload.clone().into_bytes().ok().flatten()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
