//! Synchronous facade over [`crate::client::Client`].
//!
//! Every call blocks the current thread on the shared runtime from
//! [`crate::runtime`]. Do not use it from inside an async context.

use crate::client::Client as AsyncClient;
use crate::cmd::{Command, ToArg};
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::executor::ExecOptions;
use crate::response::Value;
use crate::runtime::block_on;

#[derive(Debug, Clone)]
pub struct Client {
    inner: AsyncClient,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Ok(Self {
            inner: AsyncClient::new(config)?,
        })
    }

    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(ConnectionConfig::from_url(url)?)
    }

    /// The async client this facade drives.
    pub fn inner(&self) -> &AsyncClient {
        &self.inner
    }

    pub fn execute(&self, cmd: Command, options: ExecOptions) -> Result<Value> {
        block_on(self.inner.execute(cmd, options))
    }

    pub fn ping(&self) -> Result<()> {
        block_on(self.inner.ping())
    }

    pub fn publish(&self, channel: &str, message: impl ToArg) -> Result<i64> {
        block_on(self.inner.publish(channel, message))
    }

    /// Send `commands` as one batch, optionally inside MULTI/EXEC.
    pub fn execute_pipeline(
        &self,
        commands: Vec<Command>,
        transaction: bool,
    ) -> Result<Vec<Result<Value>>> {
        let mut pipe = if transaction {
            self.inner.transaction()
        } else {
            self.inner.pipeline()
        };
        for cmd in commands {
            pipe.cmd(cmd);
        }
        block_on(pipe.execute())
    }

    pub fn disconnect_all(&self) {
        self.inner.disconnect_all();
    }

    pub fn pool_idle_count(&self) -> usize {
        self.inner.pool_idle_count()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
