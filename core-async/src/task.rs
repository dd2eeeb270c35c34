//! Task spawning.
//!
//! - `spawn` places a `Send` future on the runtime the caller is running in.
//! - `spawn_local` places a `!Send` future on the current [`LocalSet`]; this
//!   is how work reaches the single-threaded host loop.
//!
//! # Examples
//!
//! ```rust
//! use core_async::{runtime, task};
//!
//! runtime::block_on_local(async {
//!     let shared = std::rc::Rc::new(5);
//!     let handle = task::spawn_local(async move { *shared * 2 });
//!     assert_eq!(handle.await.unwrap(), 10);
//! });
//! ```

pub use tokio::task::{spawn_local, yield_now, AbortHandle, JoinError, JoinHandle, LocalSet};

/// Spawns a new asynchronous task on the current Tokio runtime.
///
/// The spawned task may run on a different thread.
///
/// # Examples
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
