//! # Host Event Loop
//!
//! A single-threaded cooperative loop: a current-thread runtime plus a
//! `LocalSet`. Native threads reach it through a [`HostHandle`], which
//! queues [`HostJob`]s onto an unbounded channel; a pump task running on the
//! loop spawns each job as a local task.
//!
//! ```ignore
//! let output = host::block_on(|host| async move {
//!     let bridge = Bridge::builder(config).host(Arc::new(host)).build()?;
//!     bridge.call_infallible(Operation::function("sleep"), CallOptions::none(), work).await
//! })?;
//! ```

use std::future::Future;

use bridge_traits::error::Result as DispatchResult;
use bridge_traits::host::{HostDispatcher, HostJob};
use bridge_traits::BridgeError;
use core_async::runtime;
use core_async::sync::mpsc;
use core_async::task::{self, JoinHandle, LocalSet};
use tracing::debug;

use crate::error::Result;

/// Cloneable, thread-safe entry point into a [`HostLoop`].
#[derive(Debug, Clone)]
pub struct HostHandle {
    sender: mpsc::UnboundedSender<HostJob>,
}

impl HostDispatcher for HostHandle {
    fn dispatch(&self, job: HostJob) -> DispatchResult<()> {
        self.sender
            .send(job)
            .map_err(|_| BridgeError::HostUnavailable)
    }

    fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Job queue of a host loop that has not started pumping yet.
pub struct HostLoop {
    sender: mpsc::UnboundedSender<HostJob>,
    receiver: mpsc::UnboundedReceiver<HostJob>,
}

impl Default for HostLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            sender: self.sender.clone(),
        }
    }

    /// Starts running queued jobs on the current `LocalSet`.
    ///
    /// Jobs queued before this call run first, in order. The pump stops once
    /// every [`HostHandle`] is dropped; aborting the returned task stops it
    /// early and makes further dispatches fail.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `LocalSet`.
    pub fn start(self) -> JoinHandle<()> {
        let Self {
            sender,
            mut receiver,
        } = self;
        drop(sender);

        task::spawn_local(async move {
            debug!("host loop started");
            while let Some(job) = receiver.recv().await {
                task::spawn_local(job());
            }
            debug!("host loop stopped");
        })
    }
}

impl std::fmt::Debug for HostLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoop")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Runs `main` on a fresh host loop and returns its output.
///
/// `main` receives the loop's handle; the loop is pumping by the time
/// `main`'s future is first polled.
pub fn block_on<M, F>(main: M) -> Result<F::Output>
where
    M: FnOnce(HostHandle) -> F,
    F: Future,
{
    let runtime = runtime::current_thread()?;
    let local = LocalSet::new();

    Ok(local.block_on(&runtime, async move {
        let host = HostLoop::new();
        let handle = host.handle();
        host.start();
        main(handle).await
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::sync::oneshot;
    use futures::FutureExt;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[core_async::test]
    async fn test_jobs_run_on_host_thread() {
        let host = HostLoop::new();
        let handle = host.handle();
        host.start();

        let host_thread = std::thread::current().id();
        let (sender, receiver) = oneshot::channel();
        let dispatcher = handle.clone();

        std::thread::spawn(move || {
            let job: HostJob = Box::new(move || {
                async move {
                    let _ = sender.send(std::thread::current().id());
                }
                .boxed_local()
            });
            dispatcher.dispatch(job).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(receiver.await.unwrap(), host_thread);
        assert!(handle.is_running());
    }

    thread_local! {
        static HOST_LOG: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
        static FINISHED: Cell<usize> = const { Cell::new(0) };
    }

    #[core_async::test]
    async fn test_jobs_may_hold_local_state() {
        let host = HostLoop::new();
        let handle = host.handle();

        for index in 0..3 {
            let job: HostJob = Box::new(move || {
                async move {
                    let local = Rc::new(index);
                    HOST_LOG.with(|log| log.borrow_mut().push(*local));
                    core_async::task::yield_now().await;
                    assert_eq!(Rc::strong_count(&local), 1);
                    FINISHED.with(|finished| finished.set(finished.get() + 1));
                }
                .boxed_local()
            });
            handle.dispatch(job).unwrap();
        }

        host.start();
        for _ in 0..100 {
            if FINISHED.with(Cell::get) == 3 {
                break;
            }
            core_async::task::yield_now().await;
        }

        // Jobs start in dispatch order; completion order is up to the scheduler.
        assert_eq!(FINISHED.with(Cell::get), 3);
        HOST_LOG.with(|log| assert_eq!(*log.borrow(), vec![0, 1, 2]));
    }

    #[core_async::test]
    async fn test_dispatch_fails_once_loop_is_gone() {
        let host = HostLoop::new();
        let handle = host.handle();
        let pump = host.start();
        pump.abort();
        let _ = pump.await;

        let job: HostJob = Box::new(|| async {}.boxed_local());
        assert!(matches!(handle.dispatch(job), Err(BridgeError::HostUnavailable)));
        assert!(!handle.is_running());
    }

    #[test]
    fn test_block_on_runs_main() {
        let output = block_on(|handle| async move {
            let (sender, receiver) = oneshot::channel();
            let job: HostJob = Box::new(move || {
                async move {
                    let _ = sender.send("ran");
                }
                .boxed_local()
            });
            handle.dispatch(job).unwrap();
            receiver.await.unwrap()
        })
        .unwrap();

        assert_eq!(output, "ran");
    }
}
