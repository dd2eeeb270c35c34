//! Host Event Loop Dispatch
//!
//! The host runs a single-threaded cooperative event loop. Native worker
//! threads never call into host code directly; they hand a [`HostJob`] to a
//! [`HostDispatcher`], which queues it onto the loop. The job is invoked on
//! the host thread and may build a `!Send` future that borrows host-local
//! state.

use futures::future::LocalBoxFuture;

use crate::error::Result;

/// Work marshaled onto the host loop.
///
/// The closure itself crosses threads (`Send`); the future it returns is
/// created and polled on the host thread only.
pub type HostJob = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()> + Send + 'static>;

/// Thread-safe entry point into the host event loop.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::host::{HostDispatcher, HostJob};
///
/// fn notify(dispatcher: &dyn HostDispatcher) {
///     let job: HostJob = Box::new(|| Box::pin(async { println!("on the host") }));
///     dispatcher.dispatch(job).ok();
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait HostDispatcher: Send + Sync {
    /// Queue `job` onto the host loop.
    ///
    /// Returns [`BridgeError::HostUnavailable`](crate::BridgeError::HostUnavailable)
    /// once the loop has shut down. Queuing never waits for the job to run.
    fn dispatch(&self, job: HostJob) -> Result<()>;

    /// Whether the loop is still accepting jobs.
    fn is_running(&self) -> bool {
        true
    }
}
