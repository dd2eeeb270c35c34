//! Foreign futures: native code awaiting host callbacks.
//!
//! A [`ForeignCallback`] wraps a host-provided async function. Calling it
//! through [`Bridge::call_foreign`] queues the callback onto the host loop
//! and suspends the native caller until the host settles it. The call is
//! accounted as a foreign handle, released when the callback settles or
//! when the awaiting native future is dropped, whichever comes first.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use bridge_traits::host::HostJob;
use bridge_traits::BridgeError;
use core_async::sync::oneshot;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::operation::Operation;
use crate::registry::Outcome;
use crate::translator::NativeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForeignError {
    #[error("Host callback rejected: {0}")]
    Rejected(String),

    #[error("Host event loop is not available")]
    HostUnavailable,

    #[error("Host dropped the callback before it settled")]
    Dropped,
}

impl NativeError for ForeignError {
    fn type_name(&self) -> &'static str {
        match self {
            ForeignError::Rejected(_) => "ForeignError.Rejected",
            ForeignError::HostUnavailable => "ForeignError.HostUnavailable",
            ForeignError::Dropped => "ForeignError.Dropped",
        }
    }
}

type Callback<A, R> =
    dyn Fn(A) -> LocalBoxFuture<'static, Result<R, ForeignError>> + Send + Sync + 'static;

/// A host async function the native side can await.
///
/// The function is invoked on the host thread; the future it returns may
/// hold host-local (`!Send`) state.
pub struct ForeignCallback<A, R> {
    name: &'static str,
    callback: Arc<Callback<A, R>>,
}

impl<A, R> ForeignCallback<A, R> {
    pub fn new<F, Fut>(name: &'static str, callback: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ForeignError>> + 'static,
    {
        Self {
            name,
            callback: Arc::new(move |arg| callback(arg).boxed_local()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<A, R> Clone for ForeignCallback<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            callback: self.callback.clone(),
        }
    }
}

impl<A, R> fmt::Debug for ForeignCallback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignCallback")
            .field("name", &self.name)
            .finish()
    }
}

impl Bridge {
    /// Awaits `callback(arg)` on the host loop.
    ///
    /// The returned future is meant to run on the native runtime, typically
    /// inside an operation passed to [`Bridge::call`].
    #[track_caller]
    pub fn call_foreign<A, R>(
        &self,
        operation: Operation,
        callback: &ForeignCallback<A, R>,
        arg: A,
    ) -> impl Future<Output = Result<R, ForeignError>> + Send + 'static
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let call_site = Location::caller();
        let bridge = self.clone();
        let callback = callback.clone();

        async move {
            let Some(host) = bridge.host().cloned() else {
                warn!(%operation, "foreign call without a host loop");
                return Err(ForeignError::HostUnavailable);
            };

            let slot = bridge.foreign_slot(operation);
            let handle = slot.handle();
            let (sender, receiver) = oneshot::channel();

            let job: HostJob = Box::new(move || {
                async move {
                    let result = (callback.callback)(arg).await;
                    if sender.send(result).is_err() {
                        debug!(callback = callback.name, "foreign caller went away");
                    }
                }
                .boxed_local()
            });

            if let Err(error) = host.dispatch(job) {
                warn!(%handle, %error, call_site = %call_site, "host dispatch failed");
                slot.settle(Outcome::Failed);
                return Err(match error {
                    BridgeError::HostUnavailable => ForeignError::HostUnavailable,
                    other => ForeignError::Rejected(other.to_string()),
                });
            }

            let result = receiver.await.unwrap_or(Err(ForeignError::Dropped));
            slot.settle(if result.is_ok() {
                Outcome::Completed
            } else {
                Outcome::Failed
            });
            drop(slot);
            result
        }
    }
}
