//! RedisBloom Bloom filter commands (`BF.*`).
//!
//! Each method builds one command, hands it to the executor and shapes the
//! reply. Nothing here knows about connections or retries.

use bytes::Bytes;

use crate::cmd::{Command, ToArg};
use crate::error::{RedisError, Result};
use crate::executor::{ExecOptions, Executor};
use crate::response::Value;

/// Optional `BF.RESERVE` arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct BloomReserveOptions {
    pub expansion: Option<u32>,
    pub nonscaling: bool,
}

/// Optional `BF.INSERT` arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct BloomInsertOptions {
    pub capacity: Option<u64>,
    pub error_rate: Option<f64>,
    pub expansion: Option<u32>,
    pub nocreate: bool,
    pub nonscaling: bool,
}

/// `BF.INFO` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BloomInfo {
    pub capacity: i64,
    pub size: i64,
    pub filters: i64,
    pub items: i64,
    /// `None` for non-scaling filters.
    pub expansion_rate: Option<i64>,
}

pub struct Bloom<'a, E: Executor> {
    executor: &'a E,
}

impl<'a, E: Executor> Bloom<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    async fn run(&self, cmd: Command) -> Result<Value> {
        self.executor.execute(cmd, ExecOptions::default()).await
    }

    /// Create an empty filter with the given false-positive rate and
    /// expected number of items.
    pub async fn reserve(
        &self,
        key: impl ToArg,
        error_rate: f64,
        capacity: u64,
        options: BloomReserveOptions,
    ) -> Result<()> {
        let mut cmd = Command::new("BF.RESERVE")
            .arg(key)
            .arg(error_rate)
            .arg(capacity);
        if let Some(expansion) = options.expansion {
            cmd = cmd.arg("EXPANSION").arg(expansion);
        }
        if options.nonscaling {
            cmd = cmd.arg("NONSCALING");
        }
        expect_ok(self.run(cmd).await?)
    }

    /// Returns `true` if the item was newly added.
    pub async fn add(&self, key: impl ToArg, item: impl ToArg) -> Result<bool> {
        self.run(Command::new("BF.ADD").arg(key).arg(item))
            .await?
            .into_bool()
    }

    pub async fn madd<I>(&self, key: impl ToArg, items: I) -> Result<Vec<bool>>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let cmd = Command::new("BF.MADD").arg(key).args(items);
        self.run(cmd).await?.into_bools()
    }

    /// Add items, creating the filter first unless `nocreate` is set.
    pub async fn insert<I>(
        &self,
        key: impl ToArg,
        items: I,
        options: BloomInsertOptions,
    ) -> Result<Vec<bool>>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let mut cmd = Command::new("BF.INSERT").arg(key);
        if let Some(capacity) = options.capacity {
            cmd = cmd.arg("CAPACITY").arg(capacity);
        }
        if let Some(error) = options.error_rate {
            cmd = cmd.arg("ERROR").arg(error);
        }
        if let Some(expansion) = options.expansion {
            cmd = cmd.arg("EXPANSION").arg(expansion);
        }
        if options.nocreate {
            cmd = cmd.arg("NOCREATE");
        }
        if options.nonscaling {
            cmd = cmd.arg("NONSCALING");
        }
        let cmd = cmd.arg("ITEMS").args(items);
        self.run(cmd).await?.into_bools()
    }

    pub async fn exists(&self, key: impl ToArg, item: impl ToArg) -> Result<bool> {
        self.run(Command::new("BF.EXISTS").arg(key).arg(item))
            .await?
            .into_bool()
    }

    pub async fn mexists<I>(&self, key: impl ToArg, items: I) -> Result<Vec<bool>>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        let cmd = Command::new("BF.MEXISTS").arg(key).args(items);
        self.run(cmd).await?.into_bools()
    }

    /// Number of items added to the filter.
    pub async fn card(&self, key: impl ToArg) -> Result<i64> {
        self.run(Command::new("BF.CARD").arg(key)).await?.into_int()
    }

    /// One step of an incremental dump. Start with `iterator = 0` and feed
    /// each returned iterator back until it comes back as `0`.
    ///
    /// The chunk is binary, so the reply is never decoded as text.
    pub async fn scandump(&self, key: impl ToArg, iterator: i64) -> Result<(i64, Option<Bytes>)> {
        let reply = self
            .executor
            .execute(
                Command::new("BF.SCANDUMP").arg(key).arg(iterator),
                ExecOptions::raw(),
            )
            .await?;
        let mut parts = reply.into_array()?.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(next), Some(chunk), None) => Ok((next.into_int()?, chunk.into_bytes()?)),
            _ => Err(RedisError::Type(
                "BF.SCANDUMP reply must be [iterator, data]".into(),
            )),
        }
    }

    /// Restore a chunk produced by [`scandump`](Self::scandump).
    pub async fn loadchunk(&self, key: impl ToArg, iterator: i64, data: impl ToArg) -> Result<()> {
        let cmd = Command::new("BF.LOADCHUNK").arg(key).arg(iterator).arg(data);
        expect_ok(self.run(cmd).await?)
    }

    pub async fn info(&self, key: impl ToArg) -> Result<BloomInfo> {
        let mut info = BloomInfo::default();
        for (field, value) in self.run(Command::new("BF.INFO").arg(key)).await?.into_pairs()? {
            let value = value.as_int();
            match field.as_str() {
                Some("Capacity") => info.capacity = value.unwrap_or_default(),
                Some("Size") => info.size = value.unwrap_or_default(),
                Some("Number of filters") => info.filters = value.unwrap_or_default(),
                Some("Number of items inserted") => info.items = value.unwrap_or_default(),
                Some("Expansion rate") => info.expansion_rate = value,
                _ => {}
            }
        }
        Ok(info)
    }
}

fn expect_ok(reply: Value) -> Result<()> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(RedisError::Type(format!(
            "expected OK, got {}",
            reply.type_name()
        )))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
