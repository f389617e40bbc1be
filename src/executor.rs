//! The narrow interface command families are written against.

use std::future::Future;

use crate::cmd::Command;
use crate::error::Result;
use crate::response::Value;

/// Per-call execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Keep bulk strings as raw bytes even when the client decodes text.
    pub never_decode: bool,
    /// Allow re-sending after a transport failure even if the command may
    /// already have reached the server.
    pub allow_retry_after_send: bool,
}

impl ExecOptions {
    pub fn raw() -> Self {
        Self {
            never_decode: true,
            ..Self::default()
        }
    }
}

/// Anything that can run a command and return its decoded reply.
///
/// Implementations handle connection management, encoding, decoding and
/// retry behind this one call.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        cmd: Command,
        options: ExecOptions,
    ) -> impl Future<Output = Result<Value>> + Send;
}

impl<E: Executor> Executor for &E {
    fn execute(
        &self,
        cmd: Command,
        options: ExecOptions,
    ) -> impl Future<Output = Result<Value>> + Send {
        (**self).execute(cmd, options)
    }
}
