//! Process-wide tokio runtime backing the blocking client.
//!
//! The runtime is created lazily on first use and lives until the process
//! exits. Everything in [`crate::blocking`] drives its futures here.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Runtime;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get (or initialize) the shared runtime.
///
/// Multi-threaded, with the default worker count unless
/// `REDLINK_RUNTIME_THREADS` holds a positive integer.
pub fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all();

        if let Some(n) = std::env::var("REDLINK_RUNTIME_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            builder.worker_threads(n);
        }

        match builder.thread_name("redlink-rt").build() {
            Ok(rt) => rt,
            // OnceLock::get_or_init cannot fail; a process that cannot spawn
            // the runtime threads has no way to make progress anyway.
            Err(e) => panic!("redlink: failed to create tokio runtime: {e}"),
        }
    })
}

/// Drive `future` to completion on the shared runtime.
///
/// Panics when called from inside an async context.
pub fn block_on<F: Future>(future: F) -> F::Output {
    get_runtime().block_on(future)
}

/// Spawn `future` on the shared runtime.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    get_runtime().spawn(future)
}

// ── Tests ──────────────────────────────────────────────────────────
