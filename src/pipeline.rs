//! Command batching.
//!
//! A [`Pipeline`] buffers commands and sends them in a single write on one
//! connection; replies are read back in submission order and paired by
//! position. With `transaction` set, the batch is wrapped in
//! `MULTI` / `EXEC` and executes atomically on the server.

use tracing::{debug, trace};

use crate::client::Client;
use crate::cmd::Command;
use crate::error::{RedisError, Result};
use crate::resp::types::RespValue;
use crate::response::{into_value, Value};

pub struct Pipeline {
    client: Client,
    commands: Vec<Command>,
    transaction: bool,
    never_decode: bool,
}

impl Pipeline {
    pub(crate) fn new(client: Client, transaction: bool) -> Self {
        Self {
            client,
            commands: Vec::new(),
            transaction,
            never_decode: false,
        }
    }

    /// Queue a command.
    pub fn cmd(&mut self, cmd: Command) -> &mut Self {
        self.commands.push(cmd);
        self
    }

    /// Switch MULTI/EXEC wrapping on or off.
    pub fn transaction(&mut self, on: bool) -> &mut Self {
        self.transaction = on;
        self
    }

    /// Keep bulk replies as raw bytes.
    pub fn never_decode(&mut self, on: bool) -> &mut Self {
        self.never_decode = on;
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Send the batch and collect one result per queued command.
    ///
    /// Server errors occupy their own positions. A transport failure fails
    /// the whole batch. The queue is empty afterwards either way.
    pub async fn execute(&mut self) -> Result<Vec<Result<Value>>> {
        let commands = std::mem::take(&mut self.commands);
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let decode = self.client.config().decode_responses && !self.never_decode;

        let batch = if self.transaction {
            let mut wrapped = Vec::with_capacity(commands.len() + 2);
            wrapped.push(Command::new("MULTI"));
            wrapped.extend(commands.iter().cloned());
            wrapped.push(Command::new("EXEC"));
            wrapped
        } else {
            commands
        };

        let mut conn = self.client.pool().acquire().await?;
        conn.send_pipeline(&batch).await?;

        let mut replies = Vec::with_capacity(batch.len());
        for _ in 0..batch.len() {
            replies.push(conn.receive().await?);
        }
        drop(conn);
        trace!(len = batch.len(), transaction = self.transaction, "pipeline replies read");

        if self.transaction {
            exec_results(replies, decode)
        } else {
            Ok(replies.into_iter().map(|r| into_value(r, decode)).collect())
        }
    }
}

/// Unpack `[MULTI reply, QUEUED…, EXEC reply]`.
fn exec_results(mut replies: Vec<RespValue>, decode: bool) -> Result<Vec<Result<Value>>> {
    let exec = replies.pop().unwrap_or(RespValue::Null);
    let mut replies = replies.into_iter();

    if let Some(RespValue::Error(msg) | RespValue::BulkError(msg)) = replies.next() {
        return Err(RedisError::from_server(msg));
    }
    // The first command rejected at queue time explains an EXECABORT.
    let queue_error = replies.find_map(|r| match r {
        RespValue::Error(msg) | RespValue::BulkError(msg) => Some(msg),
        _ => None,
    });

    match exec.without_attributes() {
        RespValue::Null => {
            debug!("transaction aborted by WATCH");
            Err(RedisError::Watch(
                "transaction aborted: a watched key was modified".into(),
            ))
        }
        RespValue::Error(msg) | RespValue::BulkError(msg) => {
            Err(RedisError::from_server(queue_error.unwrap_or(msg)))
        }
        RespValue::Array(items) => Ok(items.into_iter().map(|r| into_value(r, decode)).collect()),
        other => Err(RedisError::Protocol(format!(
            "unexpected EXEC reply: {}",
            other.type_name()
        ))),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
