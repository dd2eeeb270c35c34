//! Runtime construction for the two sides of the bridge.
//!
//! The native side gets a multi-threaded runtime built by
//! [`multi_thread`]; the host side is modelled by [`block_on_local`], which
//! runs a future on the calling thread inside a [`LocalSet`] so that
//! `!Send` host tasks can be spawned next to it.

use std::future::Future;
use std::io;

pub use tokio::runtime::{Builder, Handle, Runtime};

use crate::task::LocalSet;

/// Runs the provided future to completion on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    current_thread()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Runs the provided future as the root task of a single-threaded host loop.
///
/// Host-local tasks spawned with [`crate::task::spawn_local`] keep running
/// while the root future is pending and are dropped when it returns.
pub fn block_on_local<F>(future: F) -> F::Output
where
    F: Future,
{
    let runtime = current_thread()
        .expect("core_async::runtime::block_on_local: failed to build Tokio runtime");
    LocalSet::new().block_on(&runtime, future)
}

/// Builds a current-thread runtime with timers and I/O enabled.
pub fn current_thread() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Builds a multi-threaded runtime with `worker_threads` workers named after
/// `thread_name`.
pub fn multi_thread(worker_threads: usize, thread_name: &str) -> io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name(thread_name)
        .enable_all()
        .build()
}
