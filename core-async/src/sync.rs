//! Synchronization primitives.
//!
//! Everything here is `Send + Sync` and async-aware; none of the locks block
//! an executor thread while waiting.
//!
//! [`CancellationToken`] is the cooperative cancellation primitive used by
//! the bridge: cloning it is cheap, cancelling it is idempotent, and
//! [`CancellationToken::cancelled`] resolves once it has been cancelled.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let token = CancellationToken::new();
//!     token.cancel();
//!     token.cancelled().await;
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    Semaphore,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
