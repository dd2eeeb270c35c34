//! Async runtime facade for the bridge crates.
//!
//! The bridge runs on two schedulers at once:
//! - the **native** side, a multi-threaded Tokio runtime that drives bridged
//!   operations;
//! - the **host** side, a single-threaded cooperative loop (a current-thread
//!   runtime plus a [`task::LocalSet`]) where deferred values are awaited.
//!
//! Every other crate in the workspace goes through this facade instead of
//! depending on Tokio directly, so the runtime choice lives in one place.
//!
//! # Modules
//!
//! - `runtime`: building and entering the native and host runtimes
//! - `task`: task spawning, including host-local tasks
//! - `time`: sleep, timeout, instants
//! - `sync`: channels, locks and the cancellation token
//!
//! # Examples
//!
//! ```rust
//! use core_async::{runtime, task};
//! use core_async::time::{sleep, Duration};
//!
//! let answer = runtime::block_on_local(async {
//!     let local = task::spawn_local(async {
//!         sleep(Duration::from_millis(1)).await;
//!         42
//!     });
//!     local.await.unwrap()
//! });
//! assert_eq!(answer, 42);
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
