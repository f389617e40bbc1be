//! Async Redis client.
//!
//! Routes every command to a single server through a connection pool and
//! applies the retry policy from the configuration.

use std::time::Duration;

use tracing::{debug, warn};

use crate::cmd::Command;
use crate::config::ConnectionConfig;
use crate::connection::pool::ConnectionPool;
use crate::error::{RedisError, Result};
use crate::executor::{ExecOptions, Executor};
use crate::pipeline::Pipeline;
use crate::pubsub::PubSub;
use crate::resp::types::RespValue;
use crate::response::{into_value, Value};

/// A Redis client backed by a connection pool. Cheap to clone; clones share
/// the pool.
#[derive(Debug, Clone)]
pub struct Client {
    pool: ConnectionPool,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(config)?,
        })
    }

    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(ConnectionConfig::from_url(url)?)
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.pool.config()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run one command and decode its reply, retrying transport failures
    /// according to the configured [`RetryPolicy`].
    ///
    /// A failure before the command was written (e.g. the connection could
    /// not be opened) is always retried. Once written, the command is only
    /// re-sent if it is idempotent or `options.allow_retry_after_send` is set.
    ///
    /// [`RetryPolicy`]: crate::config::RetryPolicy
    pub async fn execute(&self, cmd: Command, options: ExecOptions) -> Result<Value> {
        let config = self.pool.config();
        let policy = &config.retry;
        let decode = config.decode_responses && !options.never_decode;
        let name = cmd.name();
        let resendable = options.allow_retry_after_send || policy.is_idempotent(&name);

        let mut attempt = 0;
        loop {
            let mut sent = false;
            let err = match self.exchange(&cmd, &mut sent).await {
                Ok(reply) => return into_value(reply, decode),
                Err(e) => e,
            };

            let retry = attempt < policy.attempts
                && err.is_retryable(policy.retry_on_timeout)
                && (!sent || resendable);
            if !retry {
                if attempt > 0 {
                    debug!(cmd = %name, attempts = attempt + 1, error = %err, "giving up");
                }
                return Err(err);
            }

            attempt += 1;
            warn!(cmd = %name, attempt, sent, error = %err, "retrying command");
            if policy.backoff > Duration::ZERO {
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }

    async fn exchange(&self, cmd: &Command, sent: &mut bool) -> Result<RespValue> {
        let mut conn = self.pool.acquire().await?;
        *sent = true;
        conn.call(cmd).await
    }

    /// PING the server.
    pub async fn ping(&self) -> Result<()> {
        let reply = self
            .execute(Command::new("PING"), ExecOptions::default())
            .await?;
        match reply.as_str() {
            Some("PONG") => Ok(()),
            _ => Err(RedisError::Type(format!(
                "unexpected PING reply: {}",
                reply.type_name()
            ))),
        }
    }

    /// Publish `message` on `channel`; returns the number of receivers.
    pub async fn publish(&self, channel: &str, message: impl crate::cmd::ToArg) -> Result<i64> {
        self.execute(
            Command::new("PUBLISH").arg(channel).arg(message),
            ExecOptions::default(),
        )
        .await?
        .into_int()
    }

    /// Start a batch of commands sent in one write.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone(), false)
    }

    /// Start a batch wrapped in `MULTI` / `EXEC`.
    pub fn transaction(&self) -> Pipeline {
        Pipeline::new(self.clone(), true)
    }

    /// Open a subscription channel on a dedicated connection.
    pub fn pubsub(&self) -> PubSub {
        PubSub::new(self.pool.clone())
    }

    /// Close all pooled connections; checked-out ones close on release.
    pub fn disconnect_all(&self) {
        self.pool.disconnect_all();
    }

    /// Number of idle pooled connections.
    pub fn pool_idle_count(&self) -> usize {
        self.pool.idle_count()
    }

    /// Number of free checkout slots.
    pub fn pool_available(&self) -> usize {
        self.pool.available()
    }
}

impl Executor for Client {
    async fn execute(&self, cmd: Command, options: ExecOptions) -> Result<Value> {
        Client::execute(self, cmd, options).await
    }
}

// ── Tests ──────────────────────────────────────────────────────────
