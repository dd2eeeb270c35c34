//! Task-local call context.
//!
//! Every operation the bridge drives runs inside a scope carrying the
//! handle of its call, so code deep inside the operation can tell which
//! call it belongs to without threading the handle through parameters.

use std::future::Future;

use crate::registry::Handle;

tokio::task_local! {
    static CURRENT_CALL: Handle;
}

/// Handle of the bridged call whose operation is currently executing.
///
/// `None` outside a bridged operation, including on the host loop itself.
pub fn current_call() -> Option<Handle> {
    CURRENT_CALL.try_with(|handle| *handle).ok()
}

pub(crate) async fn scope<F>(handle: Handle, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_CALL.scope(handle, future).await
}
