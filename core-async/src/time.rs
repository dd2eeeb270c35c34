//! Time-related operations.
//!
//! All deadlines in the bridge are wall-clock based and measured with the
//! monotonic [`Instant`].
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(10));
//! }
//! ```

pub use tokio::time::{
    error::Elapsed, interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout,
};

pub use std::time::{Duration, Instant};

/// Converts a millisecond count as exchanged with the host into a [`Duration`].
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Returns the whole milliseconds elapsed since `start`, saturating at
/// `u64::MAX`.
pub fn elapsed_millis(start: Instant) -> u64 {
    start.elapsed().as_millis().min(u64::MAX as u128) as u64
}
