//! `redlink`: the transport and protocol core of a Redis client.
//!
//! RESP2/RESP3 codec, connections over TCP, Unix sockets or TLS, a bounded
//! connection pool, a retrying command executor, pub/sub and pipelines.
//! Command families such as [`commands::bloom`] sit on top of the
//! [`Executor`] trait.

pub mod blocking;
pub mod client;
pub mod cmd;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod pubsub;
pub mod resp;
pub mod response;
pub mod runtime;

pub use client::Client;
pub use cmd::{Command, ToArg};
pub use config::{ConnectionConfig, PoolMode, Protocol, RetryPolicy};
pub use error::{ErrorKind, RedisError, Result, ServerError};
pub use executor::{ExecOptions, Executor};
pub use pipeline::Pipeline;
pub use pubsub::{Message, PubSub};
pub use response::Value;
